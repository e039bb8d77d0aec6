//! Typed Odoo search domains.
//!
//! Only conjunctions are needed here, so a domain is a flat list of
//! `[field, operator, value]` triples.
use serde::ser::{Serialize, SerializeSeq, Serializer};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// Exact equality.
    Eq,
    /// Case-insensitive equality.
    EqILike,
    /// Case-insensitive substring match.
    ILike,
}

impl Op {
    pub fn as_str(&self) -> &'static str {
        match self {
            Op::Eq => "=",
            Op::EqILike => "=ilike",
            Op::ILike => "ilike",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub op: Op,
    pub value: Value,
}

impl Serialize for Condition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(3))?;
        seq.serialize_element(&self.field)?;
        seq.serialize_element(self.op.as_str())?;
        seq.serialize_element(&self.value)?;
        seq.end()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Domain(Vec<Condition>);

impl Domain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Self::new().and(field, Op::Eq, value)
    }

    pub fn and(mut self, field: &str, op: Op, value: impl Into<Value>) -> Self {
        self.0.push(Condition {
            field: field.to_string(),
            op,
            value: value.into(),
        });
        self
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.0
    }
}

impl Serialize for Domain {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}
