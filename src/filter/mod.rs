//! Filter state machine
//!
//! ```text
//! NoFilter --write(name)--> FilterSet(name)
//! FilterSet --write(name')--> FilterSet(name')
//! *        --write("ALL")--> NoFilter
//! ```
//!
//! A control write is parsed into a [`ControlCommand`] before the state is
//! touched, so the replacement filter is fully allocated before the old one
//! is released. A failed write leaves the previous filter in place.

use crate::{LkmaError, Result};

/// Payload that clears the filter.
pub const CLEAR_FILTER: &[u8] = b"ALL";

/// Parsed control write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    /// Dump everything.
    ClearFilter,
    /// Restrict the report to one name.
    SetFilter(Box<[u8]>),
}

/// Current filter.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FilterState {
    /// Full dump.
    #[default]
    NoFilter,
    /// Components and call-sites with exactly this name.
    FilterSet(Box<[u8]>),
}

impl FilterState {
    /// Active filter name, if any.
    pub fn name(&self) -> Option<&[u8]> {
        match self {
            FilterState::NoFilter => None,
            FilterState::FilterSet(name) => Some(&name[..]),
        }
    }

    /// Apply a parsed command; the previous filter is dropped only here.
    pub fn apply(&mut self, command: ControlCommand) {
        *self = match command {
            ControlCommand::ClearFilter => FilterState::NoFilter,
            ControlCommand::SetFilter(name) => FilterState::FilterSet(name),
        };
    }
}

/// Parse a control write.
///
/// One trailing line terminator (`\n` or `\r\n`) is stripped. An empty
/// payload is `InvalidInput`; copying the name may fail with
/// `OutOfMemory`.
pub fn parse_control(payload: &[u8]) -> Result<ControlCommand> {
    let name = strip_line_terminator(payload);
    if name.is_empty() {
        return Err(LkmaError::InvalidInput("empty filter".to_string()));
    }
    if name.contains(&0) {
        return Err(LkmaError::InvalidInput(
            "filter contains a NUL byte".to_string(),
        ));
    }
    if name == CLEAR_FILTER {
        return Ok(ControlCommand::ClearFilter);
    }

    let mut owned = Vec::new();
    owned
        .try_reserve_exact(name.len())
        .map_err(|_| LkmaError::out_of_memory("filter", name.len()))?;
    owned.extend_from_slice(name);
    Ok(ControlCommand::SetFilter(owned.into_boxed_slice()))
}

fn strip_line_terminator(payload: &[u8]) -> &[u8] {
    match payload {
        [rest @ .., b'\r', b'\n'] => rest,
        [rest @ .., b'\n'] => rest,
        _ => payload,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(b"slab.c\n", b"slab.c" ; "newline stripped")]
    #[test_case(b"slab.c\r\n", b"slab.c" ; "crlf stripped")]
    #[test_case(b"slab.c", b"slab.c" ; "no terminator")]
    #[test_case(b"slab.c\n\n", b"slab.c\n" ; "only one terminator stripped")]
    fn test_set_filter(payload: &[u8], expected: &[u8]) {
        assert_eq!(
            parse_control(payload).unwrap(),
            ControlCommand::SetFilter(expected.into())
        );
    }

    #[test_case(b"ALL" ; "bare")]
    #[test_case(b"ALL\n" ; "with newline")]
    fn test_clear_filter(payload: &[u8]) {
        assert_eq!(parse_control(payload).unwrap(), ControlCommand::ClearFilter);
    }

    #[test_case(b"" ; "empty")]
    #[test_case(b"\n" ; "only newline")]
    #[test_case(b"a\0b" ; "embedded nul")]
    fn test_invalid(payload: &[u8]) {
        assert!(matches!(
            parse_control(payload),
            Err(LkmaError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_transitions() {
        let mut state = FilterState::default();
        assert_eq!(state.name(), None);

        state.apply(parse_control(b"fork.c\n").unwrap());
        assert_eq!(state.name(), Some(&b"fork.c"[..]));

        state.apply(parse_control(b"exit.c").unwrap());
        assert_eq!(state.name(), Some(&b"exit.c"[..]));

        state.apply(parse_control(b"ALL\n").unwrap());
        assert_eq!(state, FilterState::NoFilter);
    }

    #[test]
    fn test_failed_parse_keeps_previous_filter() {
        let mut state = FilterState::FilterSet(b"fork.c".to_vec().into_boxed_slice());
        if let Ok(command) = parse_control(b"") {
            state.apply(command);
        }
        assert_eq!(state.name(), Some(&b"fork.c"[..]));
    }
}
