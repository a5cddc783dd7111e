//! A single printed card and its one-line rendering.

/// Class restriction of a card.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CardClass {
    /// Playable by every class.
    #[default]
    Neutral,
    Druid,
    Hunter,
    Mage,
    Paladin,
    Priest,
    Rogue,
    Shaman,
    Warlock,
    Warrior,
}

impl CardClass {
    /// Map the `Class` tag value.
    pub fn from_tag(value: i32) -> Self {
        match value {
            2 => Self::Druid,
            3 => Self::Hunter,
            4 => Self::Mage,
            5 => Self::Paladin,
            6 => Self::Priest,
            7 => Self::Rogue,
            8 => Self::Shaman,
            9 => Self::Warlock,
            10 => Self::Warrior,
            _ => Self::Neutral,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Neutral => "All classes",
            Self::Druid => "Druids",
            Self::Hunter => "Hunters",
            Self::Mage => "Mages",
            Self::Paladin => "Paladins",
            Self::Priest => "Priests",
            Self::Rogue => "Rogues",
            Self::Shaman => "Shamans",
            Self::Warlock => "Warlocks",
            Self::Warrior => "Warriors",
        }
    }
}

/// Rarity, which also picks the name colour.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Rarity {
    #[default]
    Unknown,
    Common,
    Free,
    Rare,
    Epic,
    Legendary,
}

impl Rarity {
    /// Map the `Rarity` tag value.
    pub fn from_tag(value: i32) -> Self {
        match value {
            1 => Self::Common,
            2 => Self::Free,
            3 => Self::Rare,
            4 => Self::Epic,
            5 => Self::Legendary,
            _ => Self::Unknown,
        }
    }

    /// mIRC colour number.
    fn color(self) -> Option<&'static str> {
        match self {
            Self::Free => Some("05"),
            Self::Common => Some("03"),
            Self::Rare => Some("12"),
            Self::Epic => Some("06"),
            Self::Legendary => Some("07"),
            Self::Unknown => None,
        }
    }
}

/// What kind of card this is.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CardType {
    Hero,
    #[default]
    Creature,
    Spell,
    /// Enchantments and other non-collectible effects.
    Effect,
    Weapon,
}

impl CardType {
    /// Map the `CardType` tag value. Unknown values are `None`.
    pub fn from_tag(value: i32) -> Option<Self> {
        match value {
            3 => Some(Self::Hero),
            4 => Some(Self::Creature),
            5 => Some(Self::Spell),
            6 => Some(Self::Effect),
            7 => Some(Self::Weapon),
            _ => None,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Hero => "Hero",
            Self::Creature => "Minion",
            Self::Spell => "Spell",
            Self::Effect => "Effect",
            Self::Weapon => "Weapon",
        }
    }

    /// Whether attack/health are meaningful.
    fn has_stats(self) -> bool {
        matches!(self, Self::Creature | Self::Weapon | Self::Hero)
    }
}

/// Tribe of a minion.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Family {
    #[default]
    None,
    Murloc,
    Demon,
    Mech,
    Beast,
    Totem,
    Pirate,
    Dragon,
}

impl Family {
    /// Map the `Race` tag value.
    pub fn from_tag(value: i32) -> Self {
        match value {
            14 => Self::Murloc,
            15 => Self::Demon,
            17 => Self::Mech,
            20 => Self::Beast,
            21 => Self::Totem,
            23 => Self::Pirate,
            24 => Self::Dragon,
            _ => Self::None,
        }
    }

    fn label(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Murloc => Some("Murloc"),
            Self::Demon => Some("Demon"),
            Self::Mech => Some("Mech"),
            Self::Beast => Some("Beast"),
            Self::Totem => Some("Totem"),
            Self::Pirate => Some("Pirate"),
            Self::Dragon => Some("Dragon"),
        }
    }
}

/// One print of a card. Built once per reload and never mutated.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CardVariant {
    /// Print identifier, e.g. `EX1_169`.
    pub id: String,
    /// Display name.
    pub name: String,
    pub cost: i32,
    pub attack: i32,
    /// Health for minions, durability for weapons.
    pub health: i32,
    pub class: CardClass,
    pub rarity: Rarity,
    pub card_type: CardType,
    pub family: Family,
    /// In-hand rules text, may contain markup.
    pub description: String,
    pub flavor: Option<String>,
    /// The definition this variant was parsed from, for debugging.
    pub markup: String,
}

const BOLD: &str = "\x02";
const ITALIC: &str = "\x1D";
const COLOR: &str = "\x03";
const RESET: &str = "\x0F";

/// Drop the `$`/`#` markers the client uses for spell-damage scaled numbers.
fn strip_number_markers(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if matches!(c, '$' | '#') && chars.peek().is_some_and(char::is_ascii_digit) {
            continue;
        }
        out.push(c);
    }
    out
}

/// Turn card markup into plain IRC text, optionally keeping emphasis as
/// control codes.
pub fn render_markup(text: &str, control_codes: bool) -> String {
    let (bold, italic) = if control_codes {
        (BOLD, ITALIC)
    } else {
        ("", "")
    };
    let text = text
        .replace("<b>", bold)
        .replace("</b>", bold)
        .replace("<i>", italic)
        .replace("</i>", italic)
        .replace("\\n", ". ")
        .replace('\n', ". ")
        .replace(".. ", ". ");
    strip_number_markers(&text).trim().to_string()
}

impl CardVariant {
    /// Whether this print carries flavor text.
    pub fn has_flavor(&self) -> bool {
        self.flavor.as_deref().is_some_and(|f| !f.trim().is_empty())
    }

    /// Whether this print carries rules text.
    pub fn has_description(&self) -> bool {
        !self.description.trim().is_empty()
    }

    /// One-line summary: name, cost, stats, class, type, tribe, text and
    /// flavor, separated by ` - `.
    pub fn full_text(&self, control_codes: bool) -> String {
        let name = match (control_codes, self.rarity.color()) {
            (true, Some(color)) => format!("[{COLOR}{color}{}{RESET}]", self.name),
            _ => format!("[{}]", self.name),
        };

        let mut segments = vec![name, format!("Cost: {}", self.cost)];
        if self.card_type.has_stats() || self.attack != 0 || self.health != 0 {
            segments.push(format!("{}/{}", self.attack, self.health));
        }
        segments.push(self.class.label().to_string());
        segments.push(self.card_type.label().to_string());
        if let Some(family) = self.family.label() {
            segments.push(family.to_string());
        }
        if self.has_description() {
            segments.push(render_markup(&self.description, control_codes));
        }
        if let Some(flavor) = self.flavor.as_deref().filter(|_| self.has_flavor()) {
            segments.push(format!("\"{}\"", render_markup(flavor, false)));
        }
        segments.join(" - ")
    }
}
