//! `keyword=value;keyword=value` connection strings as issued by the resource portal.

// self
use crate::_prelude::*;

/// Validation and lookup failures for connection strings.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ConnectionStringError {
	/// Input is empty or whitespace.
	#[error("Connection string is empty.")]
	Empty,
	/// Input begins with the pair separator.
	#[error("Connection string starts with separator `{separator}`.")]
	StartsWithSeparator {
		/// Pair separator in use.
		separator: String,
	},
	/// Two pair separators follow each other.
	#[error("Connection string contains consecutive separators `{separator}`.")]
	ConsecutiveSeparators {
		/// Pair separator in use.
		separator: String,
	},
	/// Segment has no keyword/value separator.
	#[error("Connection string has no value for keyword `{keyword}`.")]
	MissingValue {
		/// Raw segment text.
		keyword: String,
	},
	/// Segment value is empty and empty values are not allowed.
	#[error("Connection string has keyword `{keyword}` with an empty value.")]
	EmptyValue {
		/// Keyword with the empty value.
		keyword: String,
	},
	/// Keyword appears more than once.
	#[error("Connection string has duplicated keyword `{keyword}`.")]
	DuplicateKeyword {
		/// Repeated keyword.
		keyword: String,
	},
	/// Keyword is missing: either a segment with no keyword, or a required keyword was not found.
	#[error("{}", missing_keyword_message(.keyword))]
	MissingKeyword {
		/// Keyword that was looked up; `None` when a segment lacked one.
		keyword: Option<String>,
	},
}

fn missing_keyword_message(keyword: &Option<String>) -> String {
	match keyword {
		Some(keyword) => format!("Required keyword `{keyword}` is missing in connection string."),
		None => "Connection string has a value with no keyword.".into(),
	}
}

/// Parsed connection string.
///
/// Pairs keep their original order so [`Display`] reproduces the input layout with the original
/// separators. Keywords are case-sensitive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionString {
	pairs: Vec<(String, String)>,
	pair_separator: String,
	value_separator: String,
}
impl ConnectionString {
	/// Default separator between pairs.
	pub const PAIR_SEPARATOR: &str = ";";
	/// Default separator between keyword and value.
	pub const VALUE_SEPARATOR: &str = "=";

	/// Parses `s` with `;` and `=` separators, rejecting empty values.
	pub fn parse(s: &str) -> Result<Self, ConnectionStringError> {
		Self::parse_with(s, Self::PAIR_SEPARATOR, Self::VALUE_SEPARATOR, false)
	}

	/// Parses `s` with custom separators.
	///
	/// A single trailing pair separator is accepted. Keywords and values are whitespace-trimmed.
	pub fn parse_with(
		s: &str,
		pair_separator: &str,
		value_separator: &str,
		allow_empty_values: bool,
	) -> Result<Self, ConnectionStringError> {
		if s.trim().is_empty() {
			return Err(ConnectionStringError::Empty);
		}

		let separator = || pair_separator.to_owned();
		let mut segments = s.split(pair_separator).peekable();
		let mut pairs = Vec::<(String, String)>::new();
		let mut first = true;

		while let Some(segment) = segments.next() {
			if segment.is_empty() {
				if first {
					return Err(ConnectionStringError::StartsWithSeparator { separator: separator() });
				}
				// `a=b;` splits into a trailing empty segment.
				if segments.peek().is_none() {
					break;
				}

				return Err(ConnectionStringError::ConsecutiveSeparators { separator: separator() });
			}

			first = false;

			let Some((keyword, value)) = segment.split_once(value_separator) else {
				return Err(ConnectionStringError::MissingValue { keyword: segment.trim().into() });
			};
			let (keyword, value) = (keyword.trim(), value.trim());

			if keyword.is_empty() {
				return Err(ConnectionStringError::MissingKeyword { keyword: None });
			}
			if value.is_empty() && !allow_empty_values {
				return Err(ConnectionStringError::EmptyValue { keyword: keyword.into() });
			}
			if pairs.iter().any(|(existing, _)| existing == keyword) {
				return Err(ConnectionStringError::DuplicateKeyword { keyword: keyword.into() });
			}

			pairs.push((keyword.into(), value.into()));
		}

		Ok(Self {
			pairs,
			pair_separator: pair_separator.into(),
			value_separator: value_separator.into(),
		})
	}

	/// Value for `keyword`, failing with [`ConnectionStringError::MissingKeyword`] when absent.
	pub fn get_required(&self, keyword: &str) -> Result<&str, ConnectionStringError> {
		self.get_optional(keyword)
			.ok_or_else(|| ConnectionStringError::MissingKeyword { keyword: Some(keyword.into()) })
	}

	/// Value for `keyword`, if present.
	pub fn get_optional(&self, keyword: &str) -> Option<&str> {
		self.pairs.iter().find(|(k, _)| k == keyword).map(|(_, v)| v.as_str())
	}

	/// Value for `keyword`, or `default` when absent.
	pub fn get_or<'a>(&'a self, keyword: &str, default: &'a str) -> &'a str {
		self.get_optional(keyword).unwrap_or(default)
	}

	/// Returns `true` if `keyword` is present.
	pub fn contains(&self, keyword: &str) -> bool {
		self.get_optional(keyword).is_some()
	}

	/// Replaces the value of an existing keyword; absent keywords are left absent.
	pub fn replace(&mut self, keyword: &str, value: impl Into<String>) -> bool {
		match self.pairs.iter_mut().find(|(k, _)| k == keyword) {
			Some((_, slot)) => {
				*slot = value.into();

				true
			},
			None => false,
		}
	}

	/// Appends a new keyword; existing keywords keep their value.
	pub fn add(&mut self, keyword: impl Into<String>, value: impl Into<String>) -> bool {
		let keyword = keyword.into();

		if self.contains(&keyword) {
			return false;
		}

		self.pairs.push((keyword, value.into()));

		true
	}

	/// Iterator over `(keyword, value)` pairs in input order.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
		self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
	}
}
impl Display for ConnectionString {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		for (i, (keyword, value)) in self.pairs.iter().enumerate() {
			if i > 0 {
				f.write_str(&self.pair_separator)?;
			}

			f.write_str(keyword)?;

			if !value.is_empty() {
				write!(f, "{}{value}", self.value_separator)?;
			}
		}

		Ok(())
	}
}
impl FromStr for ConnectionString {
	type Err = ConnectionStringError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::parse(s)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn parses_endpoint_and_key() {
		let cs = ConnectionString::parse(" endpoint = https://x ;accesskey=abc;")
			.expect("Connection string fixture should parse.");

		assert_eq!(cs.get_required("endpoint"), Ok("https://x"));
		assert_eq!(cs.get_required("accesskey"), Ok("abc"));
		assert_eq!(cs.get_optional("missing"), None);
		assert_eq!(cs.get_or("missing", "fallback"), "fallback");
		assert!(cs.contains("endpoint"));
		assert_eq!(
			cs.get_required("missing"),
			Err(ConnectionStringError::MissingKeyword { keyword: Some("missing".into()) })
		);
	}

	#[test]
	fn validation_failures() {
		let cases = [
			("", ConnectionStringError::Empty),
			(";a=b", ConnectionStringError::StartsWithSeparator { separator: ";".into() }),
			("a=b;;c=d", ConnectionStringError::ConsecutiveSeparators { separator: ";".into() }),
			("a=b;c", ConnectionStringError::MissingValue { keyword: "c".into() }),
			("a=", ConnectionStringError::EmptyValue { keyword: "a".into() }),
			("a=b;a=c", ConnectionStringError::DuplicateKeyword { keyword: "a".into() }),
			("=novalue", ConnectionStringError::MissingKeyword { keyword: None }),
		];

		for (input, expected) in cases {
			assert_eq!(ConnectionString::parse(input), Err(expected), "Input `{input}` should fail.");
		}
	}

	#[test]
	fn empty_values_and_custom_separators() {
		let cs = ConnectionString::parse_with("a:1|b:", "|", ":", true)
			.expect("Empty values should be allowed when requested.");

		assert_eq!(cs.get_optional("b"), Some(""));
		assert_eq!(cs.to_string(), "a:1|b");
	}

	#[test]
	fn replace_and_add_respect_presence() {
		let mut cs = ConnectionString::parse("endpoint=https://x;accesskey=abc")
			.expect("Connection string fixture should parse.");

		assert!(cs.replace("accesskey", "def"));
		assert!(!cs.replace("absent", "value"));
		assert!(!cs.add("endpoint", "https://y"));
		assert!(cs.add("region", "westus"));
		assert_eq!(cs.to_string(), "endpoint=https://x;accesskey=def;region=westus");
		assert_eq!(cs.to_string().parse::<ConnectionString>(), Ok(cs));
	}

	#[test]
	fn missing_keyword_messages() {
		assert_eq!(
			ConnectionStringError::MissingKeyword { keyword: Some("endpoint".into()) }.to_string(),
			"Required keyword `endpoint` is missing in connection string."
		);
		assert_eq!(
			ConnectionStringError::MissingKeyword { keyword: None }.to_string(),
			"Connection string has a value with no keyword."
		);
	}
}
