//! Expression grammars.
//!
//! - [`calc`]: arithmetic for the `calc` function
//! - [`condition`]: the boolean path used by `if`, `<tpl:if>`, `checked`
//!   and `selected`
//!
//! Both run over the same token stream, in which variables and nested
//! calls appear as opaque placeholders.

mod calc;
mod condition;
mod tokens;

pub(crate) use calc::parse_calc;
pub(crate) use condition::parse_condition;
