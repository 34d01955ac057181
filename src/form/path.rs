//! Dot/bracket field paths such as `work[2].range.to`

use serde_json::{Map, Value};
use std::fmt;

use crate::error::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    Index(usize),
}

/// A parsed field path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    segments: Vec<Segment>,
}

impl FieldPath {
    pub fn parse(path: &str) -> Result<Self, Error> {
        let invalid = || Error::InvalidField(path.to_string());
        let mut segments = Vec::new();

        for part in path.split('.') {
            let (key, mut rest) = match part.find('[') {
                Some(open) => part.split_at(open),
                None => (part, ""),
            };
            if key.is_empty() {
                return Err(invalid());
            }
            segments.push(Segment::Key(key.to_string()));

            while !rest.is_empty() {
                let close = rest.find(']').ok_or_else(invalid)?;
                let index = rest[1..close].parse().map_err(|_| invalid())?;
                segments.push(Segment::Index(index));
                rest = &rest[close + 1..];
                if !rest.is_empty() && !rest.starts_with('[') {
                    return Err(invalid());
                }
            }
        }

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn get<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        self.segments
            .iter()
            .try_fold(root, |value, segment| match segment {
                Segment::Key(key) => value.get(key.as_str()),
                Segment::Index(i) => value.get(*i),
            })
    }

    /// Write `new_value` at this path. Object keys are created on the way;
    /// list indices must already exist.
    pub fn set(&self, root: &mut Value, new_value: Value) -> Result<(), Error> {
        let invalid = || Error::InvalidField(self.to_string());
        let mut current = root;

        for segment in &self.segments {
            current = match segment {
                Segment::Key(key) => {
                    if current.is_null() {
                        *current = Value::Object(Map::new());
                    }
                    current
                        .as_object_mut()
                        .ok_or_else(invalid)?
                        .entry(key.clone())
                        .or_insert(Value::Null)
                }
                Segment::Index(i) => current
                    .as_array_mut()
                    .and_then(|items| items.get_mut(*i))
                    .ok_or_else(invalid)?,
            };
        }

        *current = new_value;
        Ok(())
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Key(key) if i == 0 => write!(f, "{}", key)?,
                Segment::Key(key) => write!(f, ".{}", key)?,
                Segment::Index(index) => write!(f, "[{}]", index)?,
            }
        }
        Ok(())
    }
}
