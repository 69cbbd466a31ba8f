//! Module records and the static enumeration tables behind them.
//!
//! Attribute and category codes are fixed by the game data; everything the
//! extractor produces maps through the tables in this file so unknown codes
//! are rejected at decode time instead of leaking into the engine.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Number of known attribute types.
pub const ATTR_COUNT: usize = 13;

/// Closed enumeration of module attribute types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributeType {
	Strength,
	Agility,
	Intellect,
	SpecialDamage,
	EliteStrike,
	HealBonusSpecial,
	HealBonusExpert,
	CastFocus,
	AttackSpeedFocus,
	CritFocus,
	LuckFocus,
	MagicResist,
	PhysicalResist,
}

/// All attribute types in index order.
pub const ALL_ATTRIBUTES: [AttributeType; ATTR_COUNT] = [
	AttributeType::Strength,
	AttributeType::Agility,
	AttributeType::Intellect,
	AttributeType::SpecialDamage,
	AttributeType::EliteStrike,
	AttributeType::HealBonusSpecial,
	AttributeType::HealBonusExpert,
	AttributeType::CastFocus,
	AttributeType::AttackSpeedFocus,
	AttributeType::CritFocus,
	AttributeType::LuckFocus,
	AttributeType::MagicResist,
	AttributeType::PhysicalResist,
];

impl AttributeType {
	/// Dense index into per-attribute tables, 0..[`ATTR_COUNT`].
	pub fn index(self) -> usize { self as usize }

	/// Wire code used in inventory payloads.
	pub fn code(self) -> u16 {
		match self {
			AttributeType::Strength => 1110,
			AttributeType::Agility => 1111,
			AttributeType::Intellect => 1112,
			AttributeType::SpecialDamage => 1113,
			AttributeType::EliteStrike => 1114,
			AttributeType::HealBonusSpecial => 1205,
			AttributeType::HealBonusExpert => 1206,
			AttributeType::MagicResist => 1307,
			AttributeType::PhysicalResist => 1308,
			AttributeType::CastFocus => 1407,
			AttributeType::AttackSpeedFocus => 1408,
			AttributeType::CritFocus => 1409,
			AttributeType::LuckFocus => 1410,
		}
	}

	/// Reverse lookup from a wire code. Unknown codes yield `None`.
	pub fn from_code(code: u64) -> Option<Self> {
		match code {
			1110 => Some(AttributeType::Strength),
			1111 => Some(AttributeType::Agility),
			1112 => Some(AttributeType::Intellect),
			1113 => Some(AttributeType::SpecialDamage),
			1114 => Some(AttributeType::EliteStrike),
			1205 => Some(AttributeType::HealBonusSpecial),
			1206 => Some(AttributeType::HealBonusExpert),
			1307 => Some(AttributeType::MagicResist),
			1308 => Some(AttributeType::PhysicalResist),
			1407 => Some(AttributeType::CastFocus),
			1408 => Some(AttributeType::AttackSpeedFocus),
			1409 => Some(AttributeType::CritFocus),
			1410 => Some(AttributeType::LuckFocus),
			_ => None,
		}
	}

	/// Human readable name shown in result listings.
	pub fn display_name(self) -> &'static str {
		match self {
			AttributeType::Strength => "Strength Boost",
			AttributeType::Agility => "Agility Boost",
			AttributeType::Intellect => "Intellect Boost",
			AttributeType::SpecialDamage => "Special Damage",
			AttributeType::EliteStrike => "Elite Strike",
			AttributeType::HealBonusSpecial => "Special Heal Bonus",
			AttributeType::HealBonusExpert => "Expert Heal Bonus",
			AttributeType::CastFocus => "Cast Focus",
			AttributeType::AttackSpeedFocus => "Attack Speed Focus",
			AttributeType::CritFocus => "Crit Focus",
			AttributeType::LuckFocus => "Luck Focus",
			AttributeType::MagicResist => "Magic Resist",
			AttributeType::PhysicalResist => "Physical Resist",
		}
	}
}

impl fmt::Display for AttributeType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.display_name())
	}
}

impl FromStr for AttributeType {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"strength" => Ok(AttributeType::Strength),
			"agility" => Ok(AttributeType::Agility),
			"intellect" => Ok(AttributeType::Intellect),
			"special-damage" => Ok(AttributeType::SpecialDamage),
			"elite-strike" => Ok(AttributeType::EliteStrike),
			"heal-special" => Ok(AttributeType::HealBonusSpecial),
			"heal-expert" => Ok(AttributeType::HealBonusExpert),
			"cast-focus" => Ok(AttributeType::CastFocus),
			"attack-speed" => Ok(AttributeType::AttackSpeedFocus),
			"crit-focus" => Ok(AttributeType::CritFocus),
			"luck-focus" => Ok(AttributeType::LuckFocus),
			"magic-resist" => Ok(AttributeType::MagicResist),
			"physical-resist" => Ok(AttributeType::PhysicalResist),
			other => Err(format!("unknown attribute: {other}")),
		}
	}
}

/// Module category, exactly one per module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
	Attack,
	Guard,
	Assist,
}

impl Category {
	/// Category implied by a module config id. Unknown ids yield `None`.
	pub fn from_config_id(config_id: u32) -> Option<Self> {
		match config_id {
			5500101 | 5500102 => Some(Category::Attack),
			5500301 | 5500302 => Some(Category::Guard),
			5500201 | 5500202 => Some(Category::Assist),
			_ => None,
		}
	}
}

impl fmt::Display for Category {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Category::Attack => "Attack",
			Category::Guard => "Guard",
			Category::Assist => "Assist",
		})
	}
}

impl FromStr for Category {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"attack" => Ok(Category::Attack),
			"guard" => Ok(Category::Guard),
			"assist" => Ok(Category::Assist),
			other => Err(format!("unknown category: {other}")),
		}
	}
}

/// Display name for a module config id.
pub fn config_name(config_id: u32) -> Option<&'static str> {
	match config_id {
		5500101 => Some("Basic Attack"),
		5500102 => Some("High Performance Attack"),
		5500201 => Some("Basic Heal"),
		5500202 => Some("High Performance Heal"),
		5500301 => Some("Basic Guard"),
		5500302 => Some("High Performance Guard"),
		_ => None,
	}
}

/// Bit set over the 13 attribute types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AttributeSet(u16);

impl AttributeSet {
	/// The empty set.
	pub fn empty() -> Self { Self(0) }

	pub fn insert(&mut self, attr: AttributeType) { self.0 |= 1 << attr.index(); }

	pub fn contains(&self, attr: AttributeType) -> bool { self.0 & (1 << attr.index()) != 0 }

	pub fn is_empty(&self) -> bool { self.0 == 0 }

	pub fn len(&self) -> usize { self.0.count_ones() as usize }

	/// True when every member of `other` is also in `self`.
	pub fn is_superset(&self, other: &AttributeSet) -> bool { self.0 & other.0 == other.0 }

	pub fn iter(&self) -> impl Iterator<Item = AttributeType> + '_ {
		ALL_ATTRIBUTES.iter().copied().filter(|a| self.contains(*a))
	}
}

impl FromIterator<AttributeType> for AttributeSet {
	fn from_iter<I: IntoIterator<Item = AttributeType>>(iter: I) -> Self {
		let mut set = Self::empty();
		for attr in iter {
			set.insert(attr);
		}
		set
	}
}

/// One equippable module extracted from traffic.
///
/// Never mutated in place; inventory updates replace records wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
	/// Stable identifier from the server payload, unique within a session.
	pub id: u64,
	/// Game config id, resolves the category and display name.
	pub config_id: u32,
	/// Item quality grade.
	pub quality: u32,
	pub category: Category,
	/// Attribute entries in payload order. No duplicate types.
	pub attributes: Vec<(AttributeType, u16)>,
}

impl Module {
	/// Display name derived from the config id.
	pub fn name(&self) -> &'static str {
		config_name(self.config_id).unwrap_or("Unknown Module")
	}

	/// Value carried for one attribute, zero when absent.
	pub fn value_of(&self, attr: AttributeType) -> u16 {
		self
			.attributes
			.iter()
			.find(|(a, _)| *a == attr)
			.map(|(_, v)| *v)
			.unwrap_or(0)
	}

	/// Set of attribute types present on this module.
	pub fn attribute_set(&self) -> AttributeSet {
		self.attributes.iter().map(|(a, _)| *a).collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn attribute_codes_round_trip() {
		for attr in ALL_ATTRIBUTES {
			assert_eq!(AttributeType::from_code(attr.code() as u64), Some(attr));
		}
		assert_eq!(AttributeType::from_code(9999), None);
	}

	#[test]
	fn attribute_indices_are_dense() {
		for (i, attr) in ALL_ATTRIBUTES.iter().enumerate() {
			assert_eq!(attr.index(), i);
		}
	}

	#[test]
	fn category_from_config_id() {
		assert_eq!(Category::from_config_id(5500101), Some(Category::Attack));
		assert_eq!(Category::from_config_id(5500302), Some(Category::Guard));
		assert_eq!(Category::from_config_id(5500202), Some(Category::Assist));
		assert_eq!(Category::from_config_id(1234), None);
	}

	#[test]
	fn attribute_set_operations() {
		let mut set = AttributeSet::empty();
		assert!(set.is_empty());
		set.insert(AttributeType::Strength);
		set.insert(AttributeType::LuckFocus);
		assert_eq!(set.len(), 2);
		assert!(set.contains(AttributeType::Strength));
		assert!(!set.contains(AttributeType::Agility));

		let sub: AttributeSet = [AttributeType::Strength].into_iter().collect();
		assert!(set.is_superset(&sub));
		assert!(!sub.is_superset(&set));
	}

	#[test]
	fn attribute_tokens_parse() {
		assert_eq!("strength".parse::<AttributeType>(), Ok(AttributeType::Strength));
		assert_eq!(
			"ATTACK-SPEED".parse::<AttributeType>(),
			Ok(AttributeType::AttackSpeedFocus)
		);
		assert!("bogus".parse::<AttributeType>().is_err());
	}
}
