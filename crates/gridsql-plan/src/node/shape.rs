//! Arity shapes wrapping node bodies.
//!
//! A shape owns its upstream subtree(s): it visits them before the node itself
//! and writes them to the wire before the body. Bodies never see their inputs.

use std::ops::Deref;

use crate::codec::{PlanReader, PlanWriter, WireObject};
use crate::error::PlanDecodeError;
use crate::node::PhysicalNode;
use crate::visitor::PhysicalNodeVisitor;

/// Node with exactly one upstream.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UnaryNode<B> {
    upstream: Box<PhysicalNode>,
    body: B,
}

impl<B> UnaryNode<B> {
    pub fn new(upstream: PhysicalNode, body: B) -> Self {
        Self {
            upstream: Box::new(upstream),
            body,
        }
    }

    pub fn upstream(&self) -> &PhysicalNode {
        &self.upstream
    }

    pub fn body(&self) -> &B {
        &self.body
    }

    /// Visit the upstream, then hand `self` to `on_self`.
    pub(crate) fn accept<V, F>(&self, visitor: &mut V, on_self: F) -> Result<(), V::Error>
    where
        V: PhysicalNodeVisitor + ?Sized,
        F: FnOnce(&mut V, &Self) -> Result<(), V::Error>,
    {
        self.upstream.visit(visitor)?;
        on_self(visitor, self)
    }
}

impl<B> Deref for UnaryNode<B> {
    type Target = B;

    fn deref(&self) -> &B {
        &self.body
    }
}

impl<B: WireObject> WireObject for UnaryNode<B> {
    fn write_to(&self, out: &mut PlanWriter) {
        out.write_object(self.upstream.as_ref());
        self.body.write_to(out);
    }

    fn read_from(input: &mut PlanReader) -> Result<Self, PlanDecodeError> {
        let upstream: PhysicalNode = input.read_object()?;
        let body = B::read_from(input)?;
        Ok(Self::new(upstream, body))
    }
}

/// Node with a left and a right upstream. Left is always visited and
/// written first.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BinaryNode<B> {
    left: Box<PhysicalNode>,
    right: Box<PhysicalNode>,
    body: B,
}

impl<B> BinaryNode<B> {
    pub fn new(left: PhysicalNode, right: PhysicalNode, body: B) -> Self {
        Self {
            left: Box::new(left),
            right: Box::new(right),
            body,
        }
    }

    pub fn left(&self) -> &PhysicalNode {
        &self.left
    }

    pub fn right(&self) -> &PhysicalNode {
        &self.right
    }

    pub fn body(&self) -> &B {
        &self.body
    }

    pub(crate) fn accept<V, F>(&self, visitor: &mut V, on_self: F) -> Result<(), V::Error>
    where
        V: PhysicalNodeVisitor + ?Sized,
        F: FnOnce(&mut V, &Self) -> Result<(), V::Error>,
    {
        self.left.visit(visitor)?;
        self.right.visit(visitor)?;
        on_self(visitor, self)
    }
}

impl<B> Deref for BinaryNode<B> {
    type Target = B;

    fn deref(&self) -> &B {
        &self.body
    }
}

impl<B: WireObject> WireObject for BinaryNode<B> {
    fn write_to(&self, out: &mut PlanWriter) {
        out.write_object(self.left.as_ref());
        out.write_object(self.right.as_ref());
        self.body.write_to(out);
    }

    fn read_from(input: &mut PlanReader) -> Result<Self, PlanDecodeError> {
        let left: PhysicalNode = input.read_object()?;
        let right: PhysicalNode = input.read_object()?;
        let body = B::read_from(input)?;
        Ok(Self::new(left, right, body))
    }
}
