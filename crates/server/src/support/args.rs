#![forbid(unsafe_code)]

mod enums;
mod numbers;
mod strings;
mod timestamps;

pub(crate) use enums::*;
pub(crate) use numbers::*;
pub(crate) use strings::*;
pub(crate) use timestamps::*;

use super::ai::ai_error;
use serde_json::{Map, Value};

pub(crate) type Args = Map<String, Value>;

pub(crate) fn args_object(args: Value) -> Result<Args, Value> {
    match args {
        Value::Object(obj) => Ok(obj),
        Value::Null => Ok(Map::new()),
        _ => Err(ai_error("INVALID_INPUT", "arguments must be an object")),
    }
}
