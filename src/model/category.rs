//! Category and malicious-verdict enumerations.

// crates.io
use serde::{Deserializer, Serializer, de::Visitor};
// self
use crate::{_prelude::*, error::InputError};

macro_rules! categories {
	($($variant:ident = $id:literal => $name:literal,)+) => {
		/// Content category assigned by the service.
		///
		/// Names are the stable JSON encoding; numeric IDs are the RPC encoding.
		#[allow(missing_docs)]
		#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
		pub enum Category {
			$($variant,)+
		}
		impl Category {
			/// Every known category, in ID order.
			pub const ALL: &'static [Category] = &[$(Category::$variant,)+];

			/// Numeric wire ID.
			pub const fn id(self) -> i32 {
				match self {
					$(Category::$variant => $id,)+
				}
			}

			/// Looks a category up by numeric wire ID.
			pub const fn from_id(id: i32) -> Option<Self> {
				match id {
					$($id => Some(Category::$variant),)+
					_ => None,
				}
			}

			/// Canonical name.
			pub const fn as_str(self) -> &'static str {
				match self {
					$(Category::$variant => $name,)+
				}
			}
		}
	};
}

categories! {
	Unknown = 0 => "UNKNOWN_CATEGORY",
	Abortion = 1 => "ABORTION",
	Adult = 2 => "ADULT",
	Advertising = 3 => "ADVERTISING",
	AlcoholTobacco = 4 => "ALCOHOL_TOBACCO",
	Arts = 5 => "ARTS",
	Auctions = 6 => "AUCTIONS",
	Automotive = 7 => "AUTOMOTIVE",
	Blog = 8 => "BLOG",
	Botnets = 9 => "BOTNETS",
	Business = 10 => "BUSINESS",
	Chat = 11 => "CHAT",
	Computers = 12 => "COMPUTERS_TECHNOLOGY",
	CriminalSkills = 13 => "CRIMINAL_SKILLS",
	Dating = 14 => "DATING",
	Drugs = 15 => "DRUGS",
	Education = 16 => "EDUCATION",
	Entertainment = 17 => "ENTERTAINMENT",
	FileSharing = 18 => "FILE_SHARING",
	Finance = 19 => "FINANCE",
	Gambling = 20 => "GAMBLING",
	Games = 21 => "GAMES",
	Government = 22 => "GOVERNMENT",
	Hacking = 23 => "HACKING",
	Health = 24 => "HEALTH",
	Hobbies = 25 => "HOBBIES",
	JobSearch = 26 => "JOB_SEARCH",
	Kids = 27 => "KIDS",
	Malware = 28 => "MALWARE",
	News = 29 => "NEWS",
	Nudity = 30 => "NUDITY",
	ParkedDomain = 31 => "PARKED_DOMAIN",
	Phishing = 32 => "PHISHING",
	Politics = 33 => "POLITICS",
	Pornography = 34 => "PORNOGRAPHY",
	ProxyAvoidance = 35 => "PROXY_AVOIDANCE",
	RealEstate = 36 => "REAL_ESTATE",
	Religion = 37 => "RELIGION",
	SearchEngines = 38 => "SEARCH_ENGINES",
	Shopping = 39 => "SHOPPING",
	SocialNetworking = 40 => "SOCIAL_NETWORKING",
	Spam = 41 => "SPAM_URLS",
	Sports = 42 => "SPORTS",
	StreamingMedia = 43 => "STREAMING_MEDIA",
	Travel = 44 => "TRAVEL",
	Violence = 45 => "VIOLENCE",
	Weapons = 46 => "WEAPONS",
	Webmail = 47 => "WEBMAIL",
	WebHosting = 48 => "WEB_HOSTING",
}

impl Display for Category {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for Category {
	type Err = InputError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let wanted = s.trim().replace('-', "_");

		Self::ALL
			.iter()
			.copied()
			.find(|category| category.as_str().eq_ignore_ascii_case(&wanted))
			.ok_or_else(|| InputError::UnknownCategory { value: s.to_owned() })
	}
}
impl Serialize for Category {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(self.as_str())
	}
}
impl<'de> Deserialize<'de> for Category {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		struct CategoryVisitor;
		impl Visitor<'_> for CategoryVisitor {
			type Value = Category;

			fn expecting(&self, f: &mut Formatter) -> FmtResult {
				f.write_str("a category name or numeric ID")
			}

			fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
			where
				E: serde::de::Error,
			{
				v.parse().map_err(E::custom)
			}

			fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
			where
				E: serde::de::Error,
			{
				i32::try_from(v)
					.ok()
					.and_then(Category::from_id)
					.ok_or_else(|| E::custom(format!("unknown category ID {v}")))
			}

			fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
			where
				E: serde::de::Error,
			{
				i64::try_from(v)
					.map_err(|_| E::custom(format!("unknown category ID {v}")))
					.and_then(|v| self.visit_i64(v))
			}
		}

		deserializer.deserialize_any(CategoryVisitor)
	}
}

/// Malicious-content verdict.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
	/// No verdict was reached.
	#[default]
	Unknown,
	/// Content was found clean.
	Clean,
	/// Content was found malicious.
	Malicious,
}
impl Verdict {
	/// Numeric wire ID.
	pub const fn id(self) -> i32 {
		match self {
			Verdict::Unknown => 0,
			Verdict::Clean => 1,
			Verdict::Malicious => 2,
		}
	}

	/// Maps a numeric wire ID, treating unknown values as [`Verdict::Unknown`].
	pub const fn from_id(id: i32) -> Self {
		match id {
			1 => Verdict::Clean,
			2 => Verdict::Malicious,
			_ => Verdict::Unknown,
		}
	}

	/// Canonical name.
	pub const fn as_str(self) -> &'static str {
		match self {
			Verdict::Unknown => "UNKNOWN",
			Verdict::Clean => "CLEAN",
			Verdict::Malicious => "MALICIOUS",
		}
	}
}
impl Display for Verdict {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn ids_and_names_are_consistent() {
		for (position, category) in Category::ALL.iter().enumerate() {
			assert_eq!(Category::from_id(category.id()), Some(*category));
			assert_eq!(category.id(), i32::try_from(position).expect("Position should fit i32."));
			assert_eq!(category.as_str().parse::<Category>().ok(), Some(*category));
		}
	}

	#[test]
	fn parsing_is_lenient_on_case_and_dashes_only() {
		assert_eq!("blog".parse::<Category>().ok(), Some(Category::Blog));
		assert_eq!("social-networking".parse::<Category>().ok(), Some(Category::SocialNetworking));
		assert!(matches!(
			"not-a-category".parse::<Category>(),
			Err(InputError::UnknownCategory { value }) if value == "not-a-category"
		));
	}

	#[test]
	fn serde_accepts_names_and_ids() {
		let from_name: Category =
			serde_json::from_str("\"NEWS\"").expect("Category name should deserialize.");
		let from_id: Category = serde_json::from_str("8").expect("Category ID should deserialize.");

		assert_eq!(from_name, Category::News);
		assert_eq!(from_id, Category::Blog);
		assert_eq!(
			serde_json::to_string(&Category::Blog).expect("Category should serialize."),
			"\"BLOG\""
		);
		assert!(serde_json::from_str::<Category>("\"NOPE\"").is_err());
	}

	#[test]
	fn verdict_ids_fall_back_to_unknown() {
		assert_eq!(Verdict::from_id(Verdict::Malicious.id()), Verdict::Malicious);
		assert_eq!(Verdict::from_id(42), Verdict::Unknown);
	}
}
