//! Per-kind alias tables.
//!
//! Each [`EntityKind`] has one immutable [`AliasTable`] declaring which source
//! field names feed each canonical field and which attributes are indexed.
//! The tables are plain statics; nothing mutates them at runtime. Source
//! field names are matched after key canonicalization (lowercase, `-` and
//! spaces become `_`), so `:spell-lists` and `spell_lists` are the same alias.

use crate::models::EntityKind;

/// Declared type of an indexed attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrType {
    Int,
    Float,
    Bool,
    /// Free text, stored as given.
    Text,
    /// Enumerated text, canonicalised to lowercase.
    Category,
    /// Lowercase ordered sequence of strings.
    List,
    /// Fraction-string form of a challenge rating (`"1/4"`, `"5"`).
    ChallengeRating,
}

impl AttrType {
    pub fn name(&self) -> &'static str {
        match self {
            AttrType::Int => "integer",
            AttrType::Float => "float",
            AttrType::Bool => "boolean",
            AttrType::Text => "string",
            AttrType::Category => "category",
            AttrType::List => "list of strings",
            AttrType::ChallengeRating => "challenge rating",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, AttrType::Int | AttrType::Float)
    }
}

/// One indexed attribute.
#[derive(Debug)]
pub struct AttrSpec {
    pub name: &'static str,
    pub ty: AttrType,
    /// Source field names, in preference order.
    pub aliases: &'static [&'static str],
    /// Must be present for non-lax origins.
    pub required: bool,
}

/// A non-indexed canonical payload field.
#[derive(Debug)]
pub struct PayloadField {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    /// Long text; a sequence of paragraphs is joined into one string.
    pub text: bool,
}

/// Attributes with two representations; the missing one is computed.
#[derive(Debug)]
pub enum Derivation {
    ChallengeRating {
        text: &'static str,
        decimal: &'static str,
    },
}

#[derive(Debug)]
pub struct AliasTable {
    pub kind: EntityKind,
    /// Explicit identifier fields, then alternates, in resolution order.
    pub identifier: &'static [&'static str],
    pub name: &'static [&'static str],
    pub attributes: &'static [AttrSpec],
    pub payload: &'static [PayloadField],
    pub derivations: &'static [Derivation],
}

impl AliasTable {
    pub fn attribute(&self, name: &str) -> Option<&AttrSpec> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Column that answers a range query on `name`. Challenge ratings range
    /// over their decimal form.
    pub fn range_column(&self, name: &str) -> Option<&AttrSpec> {
        let spec = self.attribute(name)?;
        if spec.ty.is_numeric() {
            return Some(spec);
        }
        self.derivations.iter().find_map(|d| match d {
            Derivation::ChallengeRating { text, decimal } if *text == name => {
                self.attribute(decimal)
            }
            _ => None,
        })
    }
}

/// Look up the alias table for `kind`.
pub fn alias_table(kind: EntityKind) -> &'static AliasTable {
    match kind {
        EntityKind::Spell => &SPELL,
        EntityKind::Creature => &CREATURE,
        EntityKind::Weapon => &WEAPON,
        EntityKind::Armor => &ARMOR,
        EntityKind::MagicItem => &MAGIC_ITEM,
        EntityKind::Background => &BACKGROUND,
        EntityKind::Feat => &FEAT,
        EntityKind::Condition => &CONDITION,
        EntityKind::Rule => &RULE,
        EntityKind::Species => &SPECIES,
        EntityKind::Class => &CLASS,
    }
}

const IDENTIFIER_FIELDS: &[&str] = &["identifier", "slug", "index", "key"];
const NAME_FIELDS: &[&str] = &["name", "title"];

const DESCRIPTION: PayloadField = PayloadField {
    name: "description",
    aliases: &["desc", "description", "text", "content"],
    text: true,
};

static SPELL: AliasTable = AliasTable {
    kind: EntityKind::Spell,
    identifier: IDENTIFIER_FIELDS,
    name: NAME_FIELDS,
    attributes: &[
        AttrSpec {
            name: "level",
            ty: AttrType::Int,
            aliases: &["level_int", "spell_level", "level"],
            required: true,
        },
        AttrSpec {
            name: "school",
            ty: AttrType::Category,
            aliases: &["school", "school_name"],
            required: true,
        },
        AttrSpec {
            name: "concentration",
            ty: AttrType::Bool,
            aliases: &["concentration", "requires_concentration"],
            required: false,
        },
        AttrSpec {
            name: "ritual",
            ty: AttrType::Bool,
            aliases: &["ritual", "can_be_cast_as_ritual"],
            required: false,
        },
        AttrSpec {
            name: "classes",
            ty: AttrType::List,
            aliases: &["classes", "spell_lists", "dnd_class", "class_list"],
            required: false,
        },
    ],
    payload: &[
        DESCRIPTION,
        PayloadField {
            name: "higher_level",
            aliases: &["higher_level", "at_higher_levels"],
            text: true,
        },
        PayloadField {
            name: "casting_time",
            aliases: &["casting_time"],
            text: false,
        },
        PayloadField {
            name: "range",
            aliases: &["range_text", "range"],
            text: false,
        },
        PayloadField {
            name: "duration",
            aliases: &["duration"],
            text: false,
        },
        PayloadField {
            name: "components",
            aliases: &["components"],
            text: false,
        },
        PayloadField {
            name: "material",
            aliases: &["material_specified", "material"],
            text: false,
        },
    ],
    derivations: &[],
};

static CREATURE: AliasTable = AliasTable {
    kind: EntityKind::Creature,
    identifier: IDENTIFIER_FIELDS,
    name: NAME_FIELDS,
    attributes: &[
        AttrSpec {
            name: "challenge_rating",
            ty: AttrType::ChallengeRating,
            aliases: &["challenge_rating_text", "challenge_rating", "challenge"],
            required: false,
        },
        AttrSpec {
            name: "challenge_rating_decimal",
            ty: AttrType::Float,
            aliases: &["challenge_rating_decimal", "cr"],
            required: false,
        },
        AttrSpec {
            name: "creature_type",
            ty: AttrType::Category,
            aliases: &["creature_type", "type"],
            required: true,
        },
        AttrSpec {
            name: "size",
            ty: AttrType::Category,
            aliases: &["size"],
            required: false,
        },
        AttrSpec {
            name: "armor_class",
            ty: AttrType::Int,
            aliases: &["armor_class", "ac"],
            required: false,
        },
        AttrSpec {
            name: "hit_points",
            ty: AttrType::Int,
            aliases: &["hit_points", "hp"],
            required: false,
        },
    ],
    payload: &[
        DESCRIPTION,
        PayloadField {
            name: "alignment",
            aliases: &["alignment"],
            text: false,
        },
        PayloadField {
            name: "actions",
            aliases: &["actions"],
            text: false,
        },
    ],
    derivations: &[Derivation::ChallengeRating {
        text: "challenge_rating",
        decimal: "challenge_rating_decimal",
    }],
};

static WEAPON: AliasTable = AliasTable {
    kind: EntityKind::Weapon,
    identifier: IDENTIFIER_FIELDS,
    name: NAME_FIELDS,
    attributes: &[
        AttrSpec {
            name: "damage_type",
            ty: AttrType::Category,
            aliases: &["damage_type"],
            required: false,
        },
        AttrSpec {
            name: "damage_dice",
            ty: AttrType::Text,
            aliases: &["damage_dice", "damage"],
            required: false,
        },
        AttrSpec {
            name: "category",
            ty: AttrType::Category,
            aliases: &["category", "weapon_category"],
            required: false,
        },
    ],
    payload: &[
        DESCRIPTION,
        PayloadField {
            name: "properties",
            aliases: &["properties"],
            text: false,
        },
        PayloadField {
            name: "cost",
            aliases: &["cost"],
            text: false,
        },
    ],
    derivations: &[],
};

static ARMOR: AliasTable = AliasTable {
    kind: EntityKind::Armor,
    identifier: IDENTIFIER_FIELDS,
    name: NAME_FIELDS,
    attributes: &[
        AttrSpec {
            name: "category",
            ty: AttrType::Category,
            aliases: &["category", "armor_category"],
            required: false,
        },
        AttrSpec {
            name: "base_armor_class",
            ty: AttrType::Int,
            aliases: &["base_armor_class", "ac_base", "base_ac", "armor_class_base"],
            required: false,
        },
        AttrSpec {
            name: "stealth_disadvantage",
            ty: AttrType::Bool,
            aliases: &["stealth_disadvantage", "grants_stealth_disadvantage"],
            required: false,
        },
    ],
    payload: &[
        DESCRIPTION,
        PayloadField {
            name: "cost",
            aliases: &["cost"],
            text: false,
        },
    ],
    derivations: &[],
};

static MAGIC_ITEM: AliasTable = AliasTable {
    kind: EntityKind::MagicItem,
    identifier: IDENTIFIER_FIELDS,
    name: NAME_FIELDS,
    attributes: &[
        AttrSpec {
            name: "rarity",
            ty: AttrType::Category,
            aliases: &["rarity"],
            required: true,
        },
        AttrSpec {
            name: "item_type",
            ty: AttrType::Category,
            aliases: &["item_type", "type", "category"],
            required: false,
        },
        AttrSpec {
            name: "requires_attunement",
            ty: AttrType::Bool,
            aliases: &["requires_attunement", "attunement"],
            required: false,
        },
    ],
    payload: &[DESCRIPTION],
    derivations: &[],
};

static BACKGROUND: AliasTable = AliasTable {
    kind: EntityKind::Background,
    identifier: IDENTIFIER_FIELDS,
    name: NAME_FIELDS,
    attributes: &[],
    payload: &[
        DESCRIPTION,
        PayloadField {
            name: "benefits",
            aliases: &["benefits", "feature", "traits"],
            text: false,
        },
    ],
    derivations: &[],
};

static FEAT: AliasTable = AliasTable {
    kind: EntityKind::Feat,
    identifier: IDENTIFIER_FIELDS,
    name: NAME_FIELDS,
    attributes: &[AttrSpec {
        name: "prerequisite",
        ty: AttrType::Text,
        aliases: &["prerequisite"],
        required: false,
    }],
    payload: &[
        DESCRIPTION,
        PayloadField {
            name: "benefits",
            aliases: &["benefits", "effects"],
            text: false,
        },
    ],
    derivations: &[],
};

static CONDITION: AliasTable = AliasTable {
    kind: EntityKind::Condition,
    identifier: IDENTIFIER_FIELDS,
    name: NAME_FIELDS,
    attributes: &[],
    payload: &[DESCRIPTION],
    derivations: &[],
};

static RULE: AliasTable = AliasTable {
    kind: EntityKind::Rule,
    identifier: IDENTIFIER_FIELDS,
    name: NAME_FIELDS,
    attributes: &[],
    payload: &[
        DESCRIPTION,
        PayloadField {
            name: "section",
            aliases: &["section", "ruleset", "parent"],
            text: false,
        },
    ],
    derivations: &[],
};

static SPECIES: AliasTable = AliasTable {
    kind: EntityKind::Species,
    identifier: IDENTIFIER_FIELDS,
    name: NAME_FIELDS,
    attributes: &[AttrSpec {
        name: "size",
        ty: AttrType::Category,
        aliases: &["size"],
        required: false,
    }],
    payload: &[
        DESCRIPTION,
        PayloadField {
            name: "traits",
            aliases: &["traits"],
            text: false,
        },
    ],
    derivations: &[],
};

static CLASS: AliasTable = AliasTable {
    kind: EntityKind::Class,
    identifier: IDENTIFIER_FIELDS,
    name: NAME_FIELDS,
    attributes: &[AttrSpec {
        name: "hit_die",
        ty: AttrType::Int,
        aliases: &["hit_die"],
        required: false,
    }],
    payload: &[
        DESCRIPTION,
        PayloadField {
            name: "hit_dice",
            aliases: &["hit_dice"],
            text: false,
        },
    ],
    derivations: &[],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_kind_has_a_table() {
        for kind in EntityKind::ALL {
            assert_eq!(alias_table(kind).kind, kind);
        }
    }

    #[test]
    fn test_attribute_names_are_unique_and_not_reserved() {
        let reserved = [
            "identifier",
            "name",
            "source_origin",
            "document_key",
            "document_name",
            "document_source",
            "payload_json",
        ];
        for kind in EntityKind::ALL {
            let table = alias_table(kind);
            let mut seen = std::collections::HashSet::new();
            for attr in table.attributes {
                assert!(seen.insert(attr.name), "{kind}: duplicate {}", attr.name);
                assert!(!reserved.contains(&attr.name), "{kind}: reserved {}", attr.name);
            }
        }
    }

    #[test]
    fn test_challenge_rating_ranges_over_decimal() {
        let table = alias_table(EntityKind::Creature);
        let col = table.range_column("challenge_rating").unwrap();
        assert_eq!(col.name, "challenge_rating_decimal");
        assert_eq!(table.range_column("hit_points").unwrap().name, "hit_points");
        assert!(table.range_column("size").is_none());
    }
}
