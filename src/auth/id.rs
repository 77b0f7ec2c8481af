//! Service and environment names.
//!
//! Both names become segments of a [`CacheKey`](crate::auth::CacheKey), so they are restricted to
//! characters that keep the rendered key unambiguous: ASCII letters, digits, `_`, and `.`.

// std
use std::{
	borrow::Borrow,
	cmp::Ordering,
	hash::{Hash, Hasher},
	marker::PhantomData,
	ops::Deref,
};
// self
use crate::_prelude::*;

const NAME_MAX_LEN: usize = 64;

/// Marker describing one family of names.
pub trait NameKind {
	/// Label used in errors and `Debug` output.
	const LABEL: &'static str;
}

/// Marker for [`ServiceName`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Service {}
impl NameKind for Service {
	const LABEL: &'static str = "Service";
}

/// Marker for [`Environment`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Deployment {}
impl NameKind for Deployment {
	const LABEL: &'static str = "Environment";
}

/// Name of a configured provider service (e.g. `twitter`).
pub type ServiceName = Name<Service>;
/// Deployment environment a service configuration is scoped to (e.g. `production`).
pub type Environment = Name<Deployment>;

/// Error returned when a name fails validation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The name was empty.
	#[error("{kind} name cannot be empty.")]
	Empty {
		/// Name family.
		kind: &'static str,
	},
	/// The name contains a character that cannot appear in a cache key segment.
	#[error("{kind} name contains unsupported character {character:?}.")]
	InvalidCharacter {
		/// Name family.
		kind: &'static str,
		/// First offending character.
		character: char,
	},
	/// The name exceeded the allowed length.
	#[error("{kind} name exceeds {max} characters.")]
	TooLong {
		/// Name family.
		kind: &'static str,
		/// Maximum permitted length.
		max: usize,
	},
}

/// Validated name tagged with its family `K`.
#[derive(Serialize, Deserialize)]
#[serde(try_from = "String", into = "String", bound = "")]
pub struct Name<K>
where
	K: NameKind,
{
	value: String,
	#[serde(skip)]
	kind: PhantomData<K>,
}
impl<K> Name<K>
where
	K: NameKind,
{
	/// Validates and wraps `value`.
	pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
		let value = value.as_ref();

		validate::<K>(value)?;

		Ok(Self { value: value.to_owned(), kind: PhantomData })
	}

	/// Borrowed name.
	pub fn as_str(&self) -> &str {
		&self.value
	}
}
impl<K> Clone for Name<K>
where
	K: NameKind,
{
	fn clone(&self) -> Self {
		Self { value: self.value.clone(), kind: PhantomData }
	}
}
impl<K> PartialEq for Name<K>
where
	K: NameKind,
{
	fn eq(&self, other: &Self) -> bool {
		self.value == other.value
	}
}
impl<K> Eq for Name<K> where K: NameKind {}
impl<K> PartialOrd for Name<K>
where
	K: NameKind,
{
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}
impl<K> Ord for Name<K>
where
	K: NameKind,
{
	fn cmp(&self, other: &Self) -> Ordering {
		self.value.cmp(&other.value)
	}
}
impl<K> Hash for Name<K>
where
	K: NameKind,
{
	fn hash<H>(&self, state: &mut H)
	where
		H: Hasher,
	{
		self.value.hash(state);
	}
}
impl<K> Deref for Name<K>
where
	K: NameKind,
{
	type Target = str;

	fn deref(&self) -> &Self::Target {
		&self.value
	}
}
impl<K> AsRef<str> for Name<K>
where
	K: NameKind,
{
	fn as_ref(&self) -> &str {
		&self.value
	}
}
impl<K> Borrow<str> for Name<K>
where
	K: NameKind,
{
	fn borrow(&self) -> &str {
		&self.value
	}
}
impl<K> From<Name<K>> for String
where
	K: NameKind,
{
	fn from(name: Name<K>) -> Self {
		name.value
	}
}
impl<K> TryFrom<String> for Name<K>
where
	K: NameKind,
{
	type Error = IdentifierError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		validate::<K>(&value)?;

		Ok(Self { value, kind: PhantomData })
	}
}
impl<K> FromStr for Name<K>
where
	K: NameKind,
{
	type Err = IdentifierError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}
impl<K> Debug for Name<K>
where
	K: NameKind,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{}({})", K::LABEL, self.value)
	}
}
impl<K> Display for Name<K>
where
	K: NameKind,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.value)
	}
}

fn validate<K>(value: &str) -> Result<(), IdentifierError>
where
	K: NameKind,
{
	let kind = K::LABEL;

	if value.is_empty() {
		return Err(IdentifierError::Empty { kind });
	}
	if let Some(character) =
		value.chars().find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '.')))
	{
		return Err(IdentifierError::InvalidCharacter { kind, character });
	}
	if value.len() > NAME_MAX_LEN {
		return Err(IdentifierError::TooLong { kind, max: NAME_MAX_LEN });
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn names_reject_characters_outside_key_segments() {
		assert!(matches!(
			ServiceName::new(" twitter"),
			Err(IdentifierError::InvalidCharacter { kind: "Service", character: ' ' })
		));
		assert!(ServiceName::new("twitter ").is_err());
		assert!(
			matches!(
				ServiceName::new("my-service"),
				Err(IdentifierError::InvalidCharacter { character: '-', .. })
			),
			"The cache key delimiter must be rejected."
		);
		assert!(Environment::new("").is_err());

		let dotted =
			ServiceName::new("yahoo.fantasy_v2").expect("Dotted service name should be valid.");

		assert_eq!(dotted.as_str(), "yahoo.fantasy_v2");
	}

	#[test]
	fn serde_validates_and_keeps_the_family_label() {
		let environment: Environment =
			serde_json::from_str("\"production\"").expect("Environment should deserialize.");

		assert_eq!(format!("{environment:?}"), "Environment(production)");
		assert_eq!(
			serde_json::to_string(&environment).expect("Serialization should succeed."),
			"\"production\""
		);
		assert!(serde_json::from_str::<Environment>("\"prod west\"").is_err());
	}

	#[test]
	fn length_limit_is_enforced() {
		ServiceName::new("s".repeat(NAME_MAX_LEN)).expect("Exact length should succeed.");

		assert!(matches!(
			ServiceName::new("s".repeat(NAME_MAX_LEN + 1)),
			Err(IdentifierError::TooLong { kind: "Service", max: NAME_MAX_LEN })
		));
	}

	#[test]
	fn names_can_be_looked_up_by_str() {
		let map: HashMap<ServiceName, u8> = HashMap::from_iter([(
			ServiceName::new("flickr").expect("Service used for lookup should be valid."),
			3_u8,
		)]);

		assert_eq!(map.get("flickr"), Some(&3));
	}
}
