//! Single-line grammar of the goroutine dump format.

use leakscope_common::{TaskId, CREATOR_PREFIX, CREATOR_TASK_MARKER, HEADER_PREFIX};

use crate::domain::StackParseError;

/// Reports whether `line` starts a new goroutine stack.
pub fn is_header(line: &str) -> bool {
    line.starts_with(HEADER_PREFIX)
}

/// Reports whether `line` is an elision marker, e.g. `...23 frames elided...`.
///
/// These replace frames in very deep stacks and have no function to parse.
pub fn is_elided(line: &str) -> bool {
    line.starts_with("...") && line.ends_with(" frames elided...")
}

/// Parses a stack header into the goroutine ID and its state.
///
/// ```text
/// goroutine 643 [runnable]:
/// goroutine 18 [chan receive, 2 minutes]:
/// goroutine 1 gp=0xc000002380 m=0 mp=0x5d7f40 [running]:
/// ```
///
/// The trailing `:` and `\n` are both optional.
pub fn parse_header(line: &str) -> Result<(TaskId, String), StackParseError> {
    let trimmed = line.strip_suffix('\n').unwrap_or(line);
    let trimmed = trimmed.strip_suffix(':').unwrap_or(trimmed);

    let mut parts = trimmed.splitn(3, ' ');
    let (Some(_), Some(id), Some(rest)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(StackParseError::MalformedHeader { line: line.to_string() });
    };

    let id: u64 = id
        .parse()
        .map_err(|_| StackParseError::BadTaskId { id: id.to_string(), line: line.to_string() })?;

    let state = match (rest.find('['), rest.rfind(']')) {
        (Some(open), Some(close)) if open < close => &rest[open + 1..close],
        _ => return Err(StackParseError::MissingState { line: line.to_string() }),
    };

    Ok((TaskId(id), state.to_string()))
}

/// A call line split into its function identifier and kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallLine<'a> {
    pub function: &'a str,
    pub is_creator: bool,
}

/// Parses the function out of a call line:
///
/// ```text
/// example.com/path/to/package.funcName(args...)
/// example.com/path/to/package.(*typeName).funcName(args...)
/// created by example.com/path/to/package.funcName
/// created by example.com/path/to/package.funcName in goroutine 12
/// ```
///
/// Returns `None` if the line is neither a creator line nor contains `(`.
pub fn parse_call(line: &str) -> Option<CallLine<'_>> {
    let call = if let Some(after) = line.strip_prefix(CREATOR_PREFIX) {
        let function = match after.find(CREATOR_TASK_MARKER) {
            Some(idx) => &after[..idx],
            None => after,
        };
        CallLine { function, is_creator: true }
    } else {
        let idx = line.rfind('(')?;
        CallLine { function: &line[..idx], is_creator: false }
    };

    if call.function.is_empty() {
        return None;
    }
    Some(call)
}

/// Reports whether `bytes` is a location line, i.e. starts with a tab.
pub fn is_location(bytes: &[u8]) -> bool {
    bytes.first() == Some(&b'\t')
}
