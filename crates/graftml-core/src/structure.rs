//! Nested Structures - Tagged Leaf/Branch Containers
//!
//! Model inputs and outputs may be arbitrarily nested ordered sequences of
//! tensors. `Structure<T>` makes that nesting explicit: every position is
//! either a `Leaf` holding one element or a `Branch` holding an ordered list
//! of sub-structures. A `Template` is a structure with the elements erased
//! and describes only the shape of the nesting.
//!
//! # Example
//! ```rust
//! use graftml_core::{Structure, Template};
//!
//! let value = Structure::branch(vec![
//!     Structure::leaf(1.0_f32),
//!     Structure::branch(vec![Structure::leaf(2.0), Structure::leaf(3.0)]),
//! ]);
//! let template: Template = value.template();
//! assert_eq!(template.num_leaves(), 3);
//! assert_eq!(template.outline(), "[*, [*, *]]");
//! ```
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

use core::fmt;

// =============================================================================
// Structure
// =============================================================================

/// An arbitrarily nested ordered structure of elements.
#[derive(Debug, Clone, PartialEq)]
pub enum Structure<T> {
    /// A single element.
    Leaf(T),
    /// An ordered sequence of sub-structures.
    Branch(Vec<Structure<T>>),
}

/// Shape of a nested structure with the elements erased.
pub type Template = Structure<()>;

impl<T> Structure<T> {
    /// Creates a leaf.
    pub fn leaf(value: T) -> Self {
        Self::Leaf(value)
    }

    /// Creates a branch from its children.
    pub fn branch(children: Vec<Self>) -> Self {
        Self::Branch(children)
    }

    /// Returns true if this is a leaf.
    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Leaf(_))
    }

    /// Returns true if this is a branch.
    pub fn is_branch(&self) -> bool {
        matches!(self, Self::Branch(_))
    }

    /// Returns the leaf element, if this is a leaf.
    pub fn as_leaf(&self) -> Option<&T> {
        match self {
            Self::Leaf(value) => Some(value),
            Self::Branch(_) => None,
        }
    }

    /// Consumes the structure and returns the leaf element, if any.
    pub fn into_leaf(self) -> Option<T> {
        match self {
            Self::Leaf(value) => Some(value),
            Self::Branch(_) => None,
        }
    }

    /// Returns the children, if this is a branch.
    pub fn children(&self) -> Option<&[Self]> {
        match self {
            Self::Leaf(_) => None,
            Self::Branch(children) => Some(children),
        }
    }

    /// Consumes the structure and returns the children, if this is a branch.
    pub fn into_children(self) -> Option<Vec<Self>> {
        match self {
            Self::Leaf(_) => None,
            Self::Branch(children) => Some(children),
        }
    }

    /// Total number of leaves, counted recursively.
    pub fn num_leaves(&self) -> usize {
        match self {
            Self::Leaf(_) => 1,
            Self::Branch(children) => children.iter().map(Self::num_leaves).sum(),
        }
    }

    /// Leaves in depth-first, left-to-right order.
    pub fn leaves(&self) -> Vec<&T> {
        let mut out = Vec::with_capacity(self.num_leaves());
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a T>) {
        match self {
            Self::Leaf(value) => out.push(value),
            Self::Branch(children) => {
                for child in children {
                    child.collect_leaves(out);
                }
            }
        }
    }

    /// Maps every leaf, preserving the nesting.
    pub fn map<U, F>(&self, mut f: F) -> Structure<U>
    where
        F: FnMut(&T) -> U,
    {
        self.map_inner(&mut f)
    }

    fn map_inner<U, F>(&self, f: &mut F) -> Structure<U>
    where
        F: FnMut(&T) -> U,
    {
        match self {
            Self::Leaf(value) => Structure::Leaf(f(value)),
            Self::Branch(children) => {
                Structure::Branch(children.iter().map(|c| c.map_inner(f)).collect())
            }
        }
    }

    /// Maps every leaf with a fallible function, preserving the nesting.
    pub fn try_map<U, E, F>(&self, mut f: F) -> Result<Structure<U>, E>
    where
        F: FnMut(&T) -> Result<U, E>,
    {
        self.try_map_inner(&mut f)
    }

    fn try_map_inner<U, E, F>(&self, f: &mut F) -> Result<Structure<U>, E>
    where
        F: FnMut(&T) -> Result<U, E>,
    {
        match self {
            Self::Leaf(value) => Ok(Structure::Leaf(f(value)?)),
            Self::Branch(children) => children
                .iter()
                .map(|c| c.try_map_inner(f))
                .collect::<Result<Vec<_>, E>>()
                .map(Structure::Branch),
        }
    }

    /// Returns the template (nesting shape) of this structure.
    pub fn template(&self) -> Template {
        self.map(|_| ())
    }

    /// Compact rendering of the nesting, `*` for each leaf.
    pub fn outline(&self) -> String {
        let mut out = String::new();
        self.write_outline(&mut out);
        out
    }

    fn write_outline(&self, out: &mut String) {
        match self {
            Self::Leaf(_) => out.push('*'),
            Self::Branch(children) => {
                out.push('[');
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    child.write_outline(out);
                }
                out.push(']');
            }
        }
    }
}

impl<T> From<T> for Structure<T> {
    fn from(value: T) -> Self {
        Self::Leaf(value)
    }
}

impl<T> fmt::Display for Structure<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.outline())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn nested() -> Structure<i32> {
        Structure::branch(vec![
            Structure::leaf(1),
            Structure::branch(vec![
                Structure::leaf(2),
                Structure::branch(vec![]),
                Structure::leaf(3),
            ]),
        ])
    }

    #[test]
    fn test_num_leaves() {
        assert_eq!(nested().num_leaves(), 3);
        assert_eq!(Structure::leaf(7).num_leaves(), 1);
        assert_eq!(Structure::<i32>::branch(vec![]).num_leaves(), 0);
    }

    #[test]
    fn test_leaves_are_depth_first() {
        let s = nested();
        let leaves: Vec<i32> = s.leaves().into_iter().copied().collect();
        assert_eq!(leaves, vec![1, 2, 3]);
    }

    #[test]
    fn test_map_preserves_nesting() {
        let doubled = nested().map(|v| v * 2);
        assert_eq!(doubled.template(), nested().template());
        let leaves: Vec<i32> = doubled.leaves().into_iter().copied().collect();
        assert_eq!(leaves, vec![2, 4, 6]);
    }

    #[test]
    fn test_try_map_stops_on_error() {
        let result: Result<Structure<i32>, String> =
            nested().try_map(|v| if *v == 2 { Err("two".to_string()) } else { Ok(*v) });
        assert_eq!(result, Err("two".to_string()));
    }

    #[test]
    fn test_outline() {
        assert_eq!(nested().outline(), "[*, [*, [], *]]");
        assert_eq!(Structure::leaf(()).to_string(), "*");
    }

    #[test]
    fn test_accessors() {
        let s = nested();
        assert!(s.is_branch());
        assert_eq!(s.children().map(<[_]>::len), Some(2));
        assert_eq!(Structure::leaf(5).into_leaf(), Some(5));
        assert!(Structure::leaf(5).children().is_none());
    }
}
