//! Provider scope lists as stored in token records and requested by callers.

// std
use std::collections::BTreeSet;
// self
use crate::_prelude::*;

/// Error raised when a scope list cannot be parsed.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ScopeValidationError {
	/// A scope carries a control character, which no provider accepts in a form value.
	#[error("Scope `{scope}` contains a control character.")]
	ControlCharacter {
		/// Offending scope.
		scope: String,
	},
}

/// Deduplicated, ordered set of provider scopes.
///
/// Providers disagree on the delimiter, so parsing accepts commas and whitespace alike. The
/// rendered form is space-delimited.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScopeSet(BTreeSet<String>);
impl ScopeSet {
	/// Number of distinct scopes.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// True when no scope is present.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Returns true if `scope` is part of the set.
	pub fn contains(&self, scope: &str) -> bool {
		self.0.contains(scope)
	}

	/// Returns true if every scope in `requested` is also granted by `self`.
	pub fn covers(&self, requested: &ScopeSet) -> bool {
		requested.0.is_subset(&self.0)
	}

	/// Iterates the scopes in byte order.
	pub fn iter(&self) -> impl Iterator<Item = &str> {
		self.0.iter().map(String::as_str)
	}
}
impl FromStr for ScopeSet {
	type Err = ScopeValidationError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		s.split(|c: char| c == ',' || c.is_whitespace())
			.filter(|scope| !scope.is_empty())
			.map(|scope| {
				if scope.chars().any(char::is_control) {
					Err(ScopeValidationError::ControlCharacter { scope: scope.to_owned() })
				} else {
					Ok(scope.to_owned())
				}
			})
			.collect::<Result<_, _>>()
			.map(Self)
	}
}
impl Display for ScopeSet {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		for (i, scope) in self.0.iter().enumerate() {
			if i > 0 {
				f.write_str(" ")?;
			}

			f.write_str(scope)?;
		}

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn parsing_accepts_comma_and_space_delimiters() {
		let scopes = ScopeSet::from_str("write,read  delete,read")
			.expect("Mixed delimiters should parse successfully.");

		assert_eq!(scopes.len(), 3);
		assert_eq!(scopes.to_string(), "delete read write");
		assert!(ScopeSet::from_str(" , ").expect("Blank lists should parse.").is_empty());
	}

	#[test]
	fn control_characters_are_rejected() {
		assert_eq!(
			ScopeSet::from_str("read,wr\u{7}ite"),
			Err(ScopeValidationError::ControlCharacter { scope: "wr\u{7}ite".into() })
		);
	}

	#[test]
	fn covers_checks_every_requested_scope() {
		let granted = ScopeSet::from_str("email profile contacts")
			.expect("Granted scope fixture should parse.");
		let subset = ScopeSet::from_str("email").expect("Subset fixture should parse.");
		let superset =
			ScopeSet::from_str("email,calendar").expect("Superset fixture should parse.");

		assert!(granted.contains("contacts"));
		assert!(granted.covers(&subset));
		assert!(granted.covers(&ScopeSet::default()));
		assert!(!granted.covers(&superset));
	}
}
