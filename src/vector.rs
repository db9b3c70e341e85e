use std::{
    hash::{Hash, Hasher},
    iter::Peekable,
    ops::Index,
    rc::Rc,
};

use imbl_sized_chunks::Chunk;

use crate::{Const, ValidBranchingConstant};

// In principle we could decouple the size of the interior nodes from the size
// of the leaves and the tail. This might make sense when `T` is large, because
// the interior nodes are always pointer-sized.
type Interior<T, const N: usize> = Chunk<Rc<Node<T, N>>, N>;
type ChunkIter<T, const N: usize> = imbl_sized_chunks::sized_chunk::Iter<T, N>;
type InteriorChunkIter<T, const N: usize> = ChunkIter<Rc<Node<T, N>>, N>;

// `N` must be a power of 2; this is important for efficiency because it allows
// the use of bitwise operations for a lot of things.
//
// Whether a node is a leaf or an interior node is determined by the level it
// sits at: leaves at level zero, interior nodes above. The discriminant exists
// so that safe code can destructure; a mismatch between level and discriminant
// is a bug, and traversals treat it as unreachable.
#[derive(Debug, Clone)]
enum Node<T, const N: usize> {
    Leaf { data: Chunk<T, N> },
    Interior { children: Interior<T, N> },
}

/// `idx` is the global index into the root node, and we are some
/// possibly-intermediate node at height `height` (where the leaf is at height
/// zero). Which of our children does the global index belong to?
fn extract_index<const N: usize>(idx: usize, height: u8) -> usize {
    let shifted: usize = idx >> (N.ilog2() * u32::from(height));
    shifted & (N - 1)
}

/// Builds a left-leaning path of interior nodes of the given height, ending at
/// the given leaf.
fn new_path<T, const N: usize>(height: u8, leaf: Rc<Node<T, N>>) -> Rc<Node<T, N>>
where
    Const<N>: ValidBranchingConstant,
{
    if height == 0 {
        leaf
    } else {
        Rc::new(Node::Interior {
            children: Chunk::unit(new_path(height - 1, leaf)),
        })
    }
}

impl<T, const N: usize> Node<T, N>
where
    Const<N>: ValidBranchingConstant,
{
    /// An inefficient but correct (and simple) method for computing the length
    /// of this subtree. The vector tracks its length itself, so this is only
    /// used for sanity-checks.
    fn len(&self) -> usize {
        match self {
            Node::Leaf { data } => data.len(),
            Node::Interior { children } => children.iter().map(|c| c.len()).sum(),
        }
    }

    /// If this node is at height `height`, try to get the element at the given
    /// index.
    fn get(&self, height: u8, idx: usize) -> Option<&T> {
        match self {
            Node::Leaf { data } => {
                debug_assert_eq!(height, 0);
                data.get(idx & (N - 1))
            }
            Node::Interior { children } => {
                let bucket_idx = extract_index::<N>(idx, height);
                children
                    .get(bucket_idx)
                    .and_then(|child| child.get(height - 1, idx))
            }
        }
    }
}

impl<T: Clone, const N: usize> Node<T, N>
where
    Const<N>: ValidBranchingConstant,
{
    /// Returns an almost identical subtree with the element at the given index
    /// replaced.
    ///
    /// Only the nodes on the path from this node down to the element are
    /// cloned (a shallow, fixed-width clone each); every sibling subtree is
    /// shared with the original.
    fn update(&self, height: u8, idx: usize, elt: T) -> Node<T, N> {
        match self {
            Node::Leaf { data } => {
                debug_assert_eq!(height, 0);
                let mut data = data.clone();
                data.set(idx & (N - 1), elt);
                Node::Leaf { data }
            }
            Node::Interior { children } => {
                let bucket_idx = extract_index::<N>(idx, height);
                let mut children = children.clone();
                let child = children[bucket_idx].update(height - 1, idx, elt);
                children.set(bucket_idx, Rc::new(child));
                Node::Interior { children }
            }
        }
    }
}

/// A persistent vector.
///
/// Elements `[0, tree_size)` live in a packed tree of `N`-wide nodes; the most
/// recently appended elements live in `tail`, a dense buffer of at most `N`
/// elements. `tree_size` is always the largest multiple of `N` strictly below
/// `length`, so the tail is non-empty whenever the vector is.
///
/// All operations take the vector by reference and return a fresh one; a
/// vector is never mutated once it has been returned to a caller. The new
/// vector shares every node the operation didn't touch, so "mutations" cost
/// one `N`-wide clone per tree level at worst.
#[derive(Debug, Clone)]
pub struct Vector<T, const N: usize>
where
    Const<N>: ValidBranchingConstant,
{
    length: usize,
    // Height of the tree structure, 0 when the root is a leaf or absent.
    height: u8,
    // `None` exactly when `tree_size() == 0`.
    root: Option<Rc<Node<T, N>>>,
    // Behind `Rc` so that tree-only updates can share it by reference.
    tail: Rc<Chunk<T, N>>,
}

impl<T, const N: usize> Vector<T, N>
where
    Const<N>: ValidBranchingConstant,
{
    /// The empty vector.
    pub fn new() -> Self {
        Self {
            length: 0,
            height: 0,
            root: None,
            tail: Rc::new(Chunk::new()),
        }
    }

    /// The number of elements in this vector.
    pub fn len(&self) -> usize {
        self.length
    }

    /// Returns `true` if the length is zero.
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// The number of elements stored in the tree, as opposed to the tail.
    fn tree_size(&self) -> usize {
        let bits = N.ilog2();
        (self.length.saturating_sub(1) >> bits) << bits
    }

    /// Gets an element at a given index, or `None` if `idx` is out-of-bounds.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use tide_lang_vector::Vector;
    /// let vec = Vector::<_, 32>::from_iter([0, 1, 2]);
    /// assert_eq!(vec.get(2), Some(&2));
    /// assert_eq!(vec.get(3), None);
    /// ```
    pub fn get(&self, idx: usize) -> Option<&T> {
        if idx >= self.length {
            return None;
        }
        let tree_size = self.tree_size();
        if idx >= tree_size {
            self.tail.get(idx - tree_size)
        } else {
            self.root.as_ref().and_then(|r| r.get(self.height, idx))
        }
    }

    /// The leaf chunk holding the element at the given index, which must lie
    /// in the tree part.
    fn leaf_for(&self, idx: usize) -> &Chunk<T, N> {
        debug_assert!(idx < self.tree_size());
        let mut node = self
            .root
            .as_ref()
            .expect("tree size positive but no root")
            .as_ref();
        let mut height = self.height;
        while let Node::Interior { children } = node {
            node = &children[extract_index::<N>(idx, height)];
            height -= 1;
        }
        let Node::Leaf { data } = node else {
            unreachable!("interior node at the leaf level");
        };
        data
    }

    /// Returns an iterator over references to vector elements.
    pub fn iter(&self) -> Iter<'_, T, N> {
        self.into_iter()
    }

    /// Like [`Vector::iter`], but starts the iteration at the element with
    /// index `idx` instead of stepping to it.
    ///
    /// Panics if `idx > self.len()`.
    pub fn iter_starting_at(&self, idx: usize) -> Iter<'_, T, N> {
        if idx > self.len() {
            panic!("out of bounds");
        }
        let tree_size = self.tree_size();
        let remaining = self.length - idx;

        if idx >= tree_size {
            return Iter {
                stack: Vec::new(),
                leaf: [].iter(),
                tail: self.tail[idx - tree_size..].iter(),
                remaining,
            };
        }

        let mut stack = Vec::with_capacity(self.height.into());
        // unwrap: `idx` is strictly less than the tree size, so there is a root
        let mut node = self.root.as_ref().unwrap().as_ref();
        let mut height = self.height;

        while let Node::Interior { children } = node {
            let bucket_idx = extract_index::<N>(idx, height);
            let mut node_iter = children[bucket_idx..].iter();

            // expect: the bucket for an in-bounds index is always populated
            node = node_iter.next().expect("empty interior node");
            stack.push(node_iter);

            height = height.checked_sub(1).expect("invalid height");
        }

        let Node::Leaf { data } = node else {
            unreachable!();
        };
        Iter {
            stack,
            leaf: data[(idx & (N - 1))..].iter(),
            tail: self.tail.iter(),
            remaining,
        }
    }
}

impl<T: Clone, const N: usize> Vector<T, N>
where
    Const<N>: ValidBranchingConstant,
{
    /// Returns an almost identical vector, with the element at the given index
    /// replaced, or `None` if `idx > self.len()`.
    ///
    /// `idx == self.len()` is the degenerate extension-by-one case and behaves
    /// exactly like [`Vector::push`].
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use tide_lang_vector::Vector;
    /// let vec = Vector::<_, 32>::from_iter([0, 1, 2]);
    /// let updated = vec.update(1, 7).unwrap();
    /// assert_eq!(updated.get(1), Some(&7));
    /// assert_eq!(vec.get(1), Some(&1));
    /// assert_eq!(vec.update(4, 7), None);
    /// ```
    pub fn update(&self, idx: usize, elt: T) -> Option<Self> {
        if idx > self.length {
            return None;
        }
        if idx == self.length {
            return Some(self.push(elt));
        }
        let tree_size = self.tree_size();
        if idx >= tree_size {
            let mut tail = Chunk::clone(&self.tail);
            tail.set(idx - tree_size, elt);
            Some(Vector {
                length: self.length,
                height: self.height,
                root: self.root.clone(),
                tail: Rc::new(tail),
            })
        } else {
            // unwrap: `idx` is strictly less than the tree size, so there is a
            // root
            let root = self.root.as_ref().unwrap();
            Some(Vector {
                length: self.length,
                height: self.height,
                root: Some(Rc::new(root.update(self.height, idx, elt))),
                tail: Rc::clone(&self.tail),
            })
        }
    }

    /// Returns an almost identical vector, with an additional element appended
    /// to the end.
    ///
    /// Runs in amortized `O(1)`: appends go to the tail buffer, and only once
    /// every `N` appends does the full tail get grafted into the tree.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use tide_lang_vector::Vector;
    /// let vec = Vector::<_, 32>::from_iter([0, 1, 2]);
    /// let longer = vec.push(3);
    /// assert_eq!(longer.len(), 4);
    /// assert_eq!(longer.get(3), Some(&3));
    /// assert_eq!(vec.len(), 3);
    /// ```
    pub fn push(&self, elt: T) -> Self {
        let tree_size = self.tree_size();

        // Room in the tail?
        if self.length - tree_size < N {
            let mut tail = Chunk::clone(&self.tail);
            tail.push_back(elt);
            return Vector {
                length: self.length + 1,
                height: self.height,
                root: self.root.clone(),
                tail: Rc::new(tail),
            };
        }

        // Full tail: it becomes the rightmost leaf of the tree.
        let tail_node = Rc::new(Node::Leaf {
            data: Chunk::clone(&self.tail),
        });
        let bits = N.ilog2();
        let (root, height) = if self.length >> bits > N.pow(u32::from(self.height)) {
            // No room for another leaf at the current height. The tree grows
            // by one level: the new root holds the old root and a left-leaning
            // path down to the new leaf.
            // unwrap: an overflowing tree is in particular non-empty
            let old_root = self.root.clone().unwrap();
            let children = Chunk::pair(old_root, new_path(self.height, tail_node));
            (Rc::new(Node::Interior { children }), self.height + 1)
        } else {
            match &self.root {
                None => (tail_node, self.height),
                Some(root) => (
                    Self::push_tail(self.length, self.height, root, tail_node),
                    self.height,
                ),
            }
        };
        Vector {
            length: self.length + 1,
            height,
            root: Some(root),
            tail: Rc::new(Chunk::unit(elt)),
        }
    }

    /// Grafts the former tail into a tree of the given height as its new
    /// rightmost leaf, cloning the nodes along the graft path. `length` is the
    /// vector's length before the push, so `length - 1` is the index of the
    /// last element of the tail being grafted.
    fn push_tail(
        length: usize,
        height: u8,
        node: &Rc<Node<T, N>>,
        tail: Rc<Node<T, N>>,
    ) -> Rc<Node<T, N>> {
        if height == 0 {
            return tail;
        }
        let Node::Interior { children } = node.as_ref() else {
            unreachable!("leaf node above the leaf level");
        };
        let bucket_idx = extract_index::<N>(length - 1, height);
        let mut children = children.clone();
        if bucket_idx < children.len() {
            let child = Self::push_tail(length, height - 1, &children[bucket_idx], tail);
            children.set(bucket_idx, child);
        } else {
            children.push_back(new_path(height - 1, tail));
        }
        Rc::new(Node::Interior { children })
    }

    /// Returns an almost identical vector, with the last element removed, or
    /// `None` if this vector is empty.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use tide_lang_vector::Vector;
    /// let vec = Vector::<_, 32>::from_iter([0, 1, 2]);
    /// let shorter = vec.pop().unwrap();
    /// assert_eq!(shorter.len(), 2);
    /// assert_eq!(vec.len(), 3);
    /// assert_eq!(Vector::<i32, 32>::new().pop(), None);
    /// ```
    pub fn pop(&self) -> Option<Self> {
        match self.length {
            0 => return None,
            1 => return Some(Vector::new()),
            _ => {}
        }
        let tree_size = self.tree_size();
        if self.length - tree_size > 1 {
            let mut tail = Chunk::clone(&self.tail);
            tail.pop_back();
            return Some(Vector {
                length: self.length - 1,
                height: self.height,
                root: self.root.clone(),
                tail: Rc::new(tail),
            });
        }

        // The tail is down to one element, so the new tail is pulled out of
        // the tree: it is the leaf holding what will be the last element.
        // unwrap: `length >= 2` and the tail holds one element, so the tree is
        // non-empty
        let root = self.root.as_ref().unwrap();
        let new_tail = Rc::new(self.leaf_for(self.length - 2).clone());
        let mut new_root = Self::pop_tail(self.length, self.height, root);
        let mut new_height = self.height;

        // If trimming left the root with a single child, the tree loses one
        // level, with that child as the new root. This is the inverse of the
        // growth step in `push`.
        let collapsed = match new_root.as_deref() {
            Some(Node::Interior { children }) if children.len() == 1 => {
                Some(Rc::clone(&children[0]))
            }
            _ => None,
        };
        if let Some(child) = collapsed {
            debug_assert!(new_height > 0);
            new_root = Some(child);
            new_height -= 1;
        }

        Some(Vector {
            length: self.length - 1,
            height: new_height,
            root: new_root,
            tail: new_tail,
        })
    }

    /// Removes the rightmost leaf from a tree of the given height, cloning the
    /// nodes along its path. Returns `None` when the removal empties the
    /// subtree. `length` is the vector's length before the pop, so
    /// `length - 2` is the index of the last element stored in the tree.
    fn pop_tail(length: usize, height: u8, node: &Rc<Node<T, N>>) -> Option<Rc<Node<T, N>>> {
        if height == 0 {
            // The subtree is exactly the leaf being pulled out.
            return None;
        }
        let Node::Interior { children } = node.as_ref() else {
            unreachable!("leaf node above the leaf level");
        };
        let bucket_idx = extract_index::<N>(length - 2, height);
        debug_assert_eq!(bucket_idx + 1, children.len());
        if height > 1 {
            match Self::pop_tail(length, height - 1, &children[bucket_idx]) {
                None if bucket_idx == 0 => None,
                None => {
                    let mut children = children.clone();
                    children.pop_back();
                    Some(Rc::new(Node::Interior { children }))
                }
                Some(child) => {
                    let mut children = children.clone();
                    children.set(bucket_idx, child);
                    Some(Rc::new(Node::Interior { children }))
                }
            }
        } else if bucket_idx == 0 {
            None
        } else {
            let mut children = children.clone();
            children.pop_back();
            Some(Rc::new(Node::Interior { children }))
        }
    }

    fn is_packed(&self) -> bool {
        // In the tree part every leaf is full, even the rightmost one: leaves
        // only ever enter the tree as a grafted full tail. Interior nodes hold
        // a contiguous prefix of children, all of them complete subtrees
        // except possibly along the rightmost spine.
        fn is_packed_rec<T, const N: usize>(n: &Node<T, N>, height: u8, right_most: bool) -> bool
        where
            Const<N>: ValidBranchingConstant,
        {
            match n {
                Node::Leaf { data } => height == 0 && data.is_full(),
                Node::Interior { children } => {
                    height > 0
                        && !children.is_empty()
                        && (right_most || children.is_full())
                        && children.iter().enumerate().all(|(i, child)| {
                            is_packed_rec(child, height - 1, right_most && i + 1 == children.len())
                        })
                }
            }
        }

        match &self.root {
            None => true,
            Some(root) => is_packed_rec(root.as_ref(), self.height, true),
        }
    }

    pub fn check_invariants(&self) {
        let tree_size = self.tree_size();
        assert_eq!(self.tail.len(), self.length - tree_size);
        assert!(self.tail.len() <= N);
        assert_eq!(self.length == 0, self.tail.is_empty());
        assert!(self.is_packed());
        assert_eq!(tree_size, self.root.as_ref().map_or(0, |root| root.len()));
        match self.root.as_deref() {
            None => assert_eq!(self.height, 0),
            Some(Node::Leaf { .. }) => assert_eq!(self.height, 0),
            Some(Node::Interior { children }) => assert!(children.len() > 1),
        }
        if self.height > 0 {
            assert!(tree_size > N.pow(u32::from(self.height)));
        }
        assert!(tree_size <= N.pow(u32::from(self.height) + 1));
    }

    /// Like [`Vector::into_iter`], but starts the iteration at the element
    /// with index `idx` instead of stepping to it.
    ///
    /// Panics if `idx > self.len()`.
    pub fn into_iter_starting_at(self, mut idx: usize) -> IntoIter<T, N> {
        if idx > self.len() {
            panic!("out of bounds");
        }
        let tree_size = self.tree_size();
        let remaining = self.length - idx;
        let mut tail = Rc::unwrap_or_clone(self.tail);

        if idx >= tree_size {
            tail.drop_left(idx - tree_size);
            return IntoIter {
                stack: Vec::new(),
                leaf: Chunk::new().into_iter(),
                tail: tail.into_iter(),
                remaining,
            };
        }

        let mut stack = Vec::with_capacity(self.height.into());
        // unwrap: `idx` is strictly less than the tree size, so there is a root
        let mut node = Rc::unwrap_or_clone(self.root.unwrap());
        let mut height = self.height;

        while let Node::Interior { mut children } = node {
            let bucket_idx = extract_index::<N>(idx, height);
            children.drop_left(bucket_idx);
            let mut node_iter = children.into_iter();
            node = Rc::unwrap_or_clone(node_iter.next().expect("empty interior node"));
            stack.push(node_iter);

            height = height.checked_sub(1).expect("invalid height");
        }

        let Node::Leaf { mut data } = node else {
            unreachable!();
        };
        idx &= N - 1;
        data.drop_left(idx);
        IntoIter {
            stack,
            leaf: data.into_iter(),
            tail: tail.into_iter(),
            remaining,
        }
    }
}

/// An iterator over vector elements, in index order.
///
/// The iterator keeps a cursor per tree level, root to leaf, with the tail as
/// a final synthetic level. Advancing within a leaf is a pointer bump;
/// crossing a leaf boundary steps the deepest level that still has a sibling
/// and re-descends from there, so a full walk touches each node once instead
/// of re-deriving the path from the root at every step.
#[derive(Debug, Clone)]
pub struct Iter<'a, T, const N: usize>
where
    Const<N>: ValidBranchingConstant,
{
    stack: Vec<std::slice::Iter<'a, Rc<Node<T, N>>>>,
    leaf: std::slice::Iter<'a, T>,
    tail: std::slice::Iter<'a, T>,
    remaining: usize,
}

impl<'a, T, const N: usize> Iterator for Iter<'a, T, N>
where
    Const<N>: ValidBranchingConstant,
{
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        self.remaining = self.remaining.checked_sub(1)?;
        if let Some(ret) = self.leaf.next() {
            return Some(ret);
        }
        let height = self.stack.len();
        let mut next = loop {
            match self.stack.last_mut() {
                Some(iter) => {
                    if let Some(next) = iter.next() {
                        break next;
                    } else {
                        self.stack.pop();
                    }
                }
                // The tree is exhausted; the rest lives in the tail.
                None => {
                    return Some(self.tail.next().expect("iterator out of sync"));
                }
            }
        };

        let cur_len = self.stack.len();
        for _ in cur_len..height {
            let Node::Interior { children } = next.as_ref() else {
                unreachable!();
            };
            let mut children_iter = children.iter();
            next = children_iter.next().expect("empty interior node");
            self.stack.push(children_iter);
        }

        let Node::Leaf { data } = next.as_ref() else {
            unreachable!();
        };
        self.leaf = data.iter();
        Some(self.leaf.next().expect("empty leaf node"))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T, const N: usize> ExactSizeIterator for Iter<'_, T, N> where Const<N>: ValidBranchingConstant {}

/// An owning iterator over vector elements, in index order.
///
/// Nodes only reachable from this iterator are consumed; nodes still shared
/// with other vectors are cloned chunk-by-chunk as the cursor reaches them.
pub struct IntoIter<T, const N: usize>
where
    Const<N>: ValidBranchingConstant,
{
    stack: Vec<InteriorChunkIter<T, N>>,
    leaf: ChunkIter<T, N>,
    tail: ChunkIter<T, N>,
    remaining: usize,
}

impl<T: Clone, const N: usize> Iterator for IntoIter<T, N>
where
    Const<N>: ValidBranchingConstant,
{
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        self.remaining = self.remaining.checked_sub(1)?;
        if let Some(ret) = self.leaf.next() {
            return Some(ret);
        }
        let height = self.stack.len();
        let mut next = loop {
            match self.stack.last_mut() {
                Some(iter) => {
                    if let Some(next) = iter.next() {
                        break next;
                    } else {
                        self.stack.pop();
                    }
                }
                None => {
                    return Some(self.tail.next().expect("iterator out of sync"));
                }
            }
        };

        let cur_len = self.stack.len();
        for _ in cur_len..height {
            let Node::Interior { children } = Rc::unwrap_or_clone(next) else {
                unreachable!();
            };
            let mut children_iter = children.into_iter();
            next = children_iter.next().expect("empty interior node");
            self.stack.push(children_iter);
        }

        let Node::Leaf { data } = Rc::unwrap_or_clone(next) else {
            unreachable!();
        };
        self.leaf = data.into_iter();
        Some(self.leaf.next().expect("empty leaf node"))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T: Clone, const N: usize> ExactSizeIterator for IntoIter<T, N> where
    Const<N>: ValidBranchingConstant
{
}

impl<'a, T, const N: usize> IntoIterator for &'a Vector<T, N>
where
    Const<N>: ValidBranchingConstant,
{
    type Item = &'a T;
    type IntoIter = Iter<'a, T, N>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_starting_at(0)
    }
}

impl<T: Clone, const N: usize> IntoIterator for Vector<T, N>
where
    Const<N>: ValidBranchingConstant,
{
    type Item = T;
    type IntoIter = IntoIter<T, N>;

    fn into_iter(self) -> Self::IntoIter {
        self.into_iter_starting_at(0)
    }
}

impl<T: Clone, const N: usize> Extend<T> for Vector<T, N>
where
    Const<N>: ValidBranchingConstant,
{
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        // Make the iterator peekable, because a full tail should only be
        // grafted into the tree once we know another element is coming.
        let mut iter: Peekable<I::IntoIter> = iter.into_iter().peekable();
        while iter.peek().is_some() {
            let tree_size = self.tree_size();
            let room = N - (self.length - tree_size);
            if room == 0 {
                // unwrap: peeked above
                *self = self.push(iter.next().unwrap());
                continue;
            }
            // Refill the tail with a single clone instead of one per element.
            let mut tail = Chunk::clone(&self.tail);
            let old_len = tail.len();
            tail.extend(iter.by_ref().take(room));
            self.length += tail.len() - old_len;
            self.tail = Rc::new(tail);
        }
    }
}

impl<T, const N: usize> Default for Vector<T, N>
where
    Const<N>: ValidBranchingConstant,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone, const N: usize> FromIterator<T> for Vector<T, N>
where
    Const<N>: ValidBranchingConstant,
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut ret = Vector::default();
        ret.extend(iter);
        ret
    }
}

impl<T: Clone, const N: usize> Index<usize> for Vector<T, N>
where
    Const<N>: ValidBranchingConstant,
{
    type Output = T;

    fn index(&self, index: usize) -> &Self::Output {
        self.get(index).expect("index out of range")
    }
}

// Equality and hashing are structural, over contents: the tree shape, the
// tail split, and any sharing between versions never leak into either. Two
// vectors built through different operation sequences compare equal exactly
// when their elements compare equal pairwise, and equal vectors feed
// identical element sequences to the hasher.
impl<T: PartialEq, const N: usize> PartialEq for Vector<T, N>
where
    Const<N>: ValidBranchingConstant,
{
    fn eq(&self, other: &Self) -> bool {
        self.length == other.length && self.iter().eq(other.iter())
    }
}

impl<T: Eq, const N: usize> Eq for Vector<T, N> where Const<N>: ValidBranchingConstant {}

impl<T: Hash, const N: usize> Hash for Vector<T, N>
where
    Const<N>: ValidBranchingConstant,
{
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.length.hash(state);
        for elt in self {
            elt.hash(state);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::hash::{BuildHasher, RandomState};

    use super::*;

    fn hash_of<T: Hash>(val: &T) -> u64 {
        // Same `RandomState` for the whole test process, so hashes of equal
        // values are comparable.
        thread_local! {
            static STATE: RandomState = RandomState::new();
        }
        STATE.with(|state| state.hash_one(val))
    }

    #[test]
    fn basic() {
        let empty = Vector::<u32, 2>::new();
        empty.check_invariants();
        let vec = empty.push(1);
        assert_eq!(vec.get(0), Some(&1));
        assert_eq!(vec.get(1), None);
        vec.check_invariants();

        let vec = vec.push(2).push(3);
        vec.check_invariants();
        assert_eq!(vec.len(), 3);
        assert_eq!(vec.get(0), Some(&1));
        assert_eq!(vec.get(1), Some(&2));
        assert_eq!(vec.get(2), Some(&3));
        assert_eq!(vec.get(3), None);
        assert!(empty.is_empty());

        let mut iter = vec.iter();
        assert_eq!(iter.next(), Some(&1));
        assert_eq!(iter.next(), Some(&2));
        assert_eq!(iter.next(), Some(&3));
        assert_eq!(iter.next(), None);

        assert_eq!(vec.iter().copied().collect::<Vec<_>>(), vec![1, 2, 3]);

        let shorter = vec.pop().unwrap();
        shorter.check_invariants();
        assert_eq!(shorter.iter().copied().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(vec.len(), 3);

        let mut extended = vec.clone();
        extended.extend([1, 2, 3]);
        extended.check_invariants();
        assert_eq!(extended.len(), 6);
        assert_eq!(
            extended.iter().copied().collect::<Vec<_>>(),
            vec![1, 2, 3, 1, 2, 3]
        );
        assert_eq!(
            extended.into_iter().collect::<Vec<_>>(),
            vec![1, 2, 3, 1, 2, 3]
        );
    }

    #[test]
    fn update_leaves_siblings_alone() {
        let vec: Vector<usize, 4> = (0..100).collect();
        let updated = vec.update(50, 1234).unwrap();
        updated.check_invariants();

        assert_eq!(updated.get(50), Some(&1234));
        for i in (0..100).filter(|i| *i != 50) {
            assert_eq!(updated.get(i), Some(&i));
        }
        assert_eq!(vec.get(50), Some(&50));

        // Updating at the length is an append.
        let appended = vec.update(100, 100).unwrap();
        appended.check_invariants();
        assert_eq!(appended.len(), 101);
        assert_eq!(appended.get(100), Some(&100));
        assert_eq!(vec.update(101, 0), None);
    }

    #[test]
    fn tail_updates_share_the_tree() {
        let vec: Vector<usize, 4> = (0..10).collect();
        // 8 elements in the tree, 2 in the tail.
        let updated = vec.update(9, 90).unwrap();
        assert!(Rc::ptr_eq(
            vec.root.as_ref().unwrap(),
            updated.root.as_ref().unwrap()
        ));

        let updated = vec.update(3, 30).unwrap();
        assert!(Rc::ptr_eq(&vec.tail, &updated.tail));
    }

    #[test]
    fn derived_versions_are_independent() {
        let v0: Vector<usize, 4> = (0..100).collect();
        let v1 = v0.update(50, 5000).unwrap();
        let v2 = v0.push(100);

        assert_eq!(v0.len(), 100);
        assert_eq!(v0.get(50), Some(&50));
        assert_eq!(v0.get(100), None);

        assert_eq!(v1.len(), 100);
        assert_eq!(v1.get(50), Some(&5000));
        assert_eq!(v1.get(100), None);

        assert_eq!(v2.len(), 101);
        assert_eq!(v2.get(50), Some(&50));
        assert_eq!(v2.get(100), Some(&100));
    }

    #[test]
    fn height_transitions() {
        // With N = 4, the first graft happens when pushing the 5th element,
        // and the root grows one level when the tree itself fills up.
        let mut versions = vec![Vector::<usize, 4>::new()];
        for i in 0..100 {
            let next = versions.last().unwrap().push(i);
            next.check_invariants();
            versions.push(next);
        }
        for (len, version) in versions.iter().enumerate() {
            assert_eq!(version.len(), len);
            let expected: Vec<usize> = (0..len).collect();
            assert_eq!(version.iter().copied().collect::<Vec<_>>(), expected);
        }

        // Popping retraces every transition in reverse.
        let mut vec = versions.pop().unwrap();
        for expected in versions.iter().rev() {
            vec = vec.pop().unwrap();
            vec.check_invariants();
            assert_eq!(&vec, expected);
        }
        assert!(vec.is_empty());
        assert_eq!(vec.pop(), None);
    }

    #[test]
    fn pop_undoes_push() {
        let vec: Vector<usize, 2> = (0..37).collect();
        for extra in [0, 1, 5] {
            let mut longer = vec.clone();
            for i in 0..extra {
                longer = longer.push(i);
            }
            for _ in 0..extra {
                longer = longer.pop().unwrap();
            }
            assert_eq!(longer, vec);
        }
    }

    #[test]
    fn iteration_matches_indexing() {
        for len in [0, 1, 3, 4, 5, 16, 17, 64, 65, 100] {
            let vec: Vector<usize, 4> = (0..len).collect();
            assert_eq!(vec.iter().len(), len);
            let elems: Vec<usize> = vec.iter().copied().collect();
            let indexed: Vec<usize> = (0..len).map(|i| *vec.get(i).unwrap()).collect();
            assert_eq!(elems, indexed);
            assert_eq!(vec.clone().into_iter().collect::<Vec<_>>(), indexed);
        }
    }

    #[test]
    fn structural_equality_and_hashing() {
        let pushed: Vector<u32, 4> = (0..50).collect();
        let mut grown = Vector::<u32, 4>::new();
        for i in 0..75 {
            grown = grown.push(i);
        }
        for _ in 0..25 {
            grown = grown.pop().unwrap();
        }

        assert_eq!(pushed, pushed);
        assert_eq!(pushed, grown);
        assert_eq!(grown, pushed);
        assert_eq!(hash_of(&pushed), hash_of(&grown));

        let different = pushed.update(10, 1000).unwrap();
        assert_ne!(pushed, different);
        assert_ne!(pushed, pushed.pop().unwrap());

        assert_eq!(Vector::<u32, 4>::new(), Vector::<u32, 4>::default());
    }
}
