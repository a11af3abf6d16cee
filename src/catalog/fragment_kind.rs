/// Fragment kind definitions
///
/// Every page fragment a species profile can be assembled from is named by a
/// closed (group, slot) pair. The catalog below is the only list of kinds in
/// the crate; the fallback expectation, the fetch plan and the diagnostic keys
/// are all derived from it.
use std::fmt;

/// A top-level section of a species profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SectionGroup {
    Nomenclature,
    Description,
    Ecology,
    HumanUses,
    Conservation,
}

impl SectionGroup {
    /// Name of the group as used in output records and ledger keys
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nomenclature => "nomenclature",
            Self::Description => "description",
            Self::Ecology => "ecology",
            Self::HumanUses => "human_uses",
            Self::Conservation => "conservation",
        }
    }

    /// Returns all section groups
    pub fn all() -> [Self; 5] {
        [
            Self::Nomenclature,
            Self::Description,
            Self::Ecology,
            Self::HumanUses,
            Self::Conservation,
        ]
    }
}

impl fmt::Display for SectionGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One independently fetched contribution to a species profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FragmentKind {
    // ===== Nomenclature =====
    /// The whole nomenclature page (a single fragment)
    Nomenclature,

    // ===== Description =====
    Habit,
    Leaf,
    Flower,
    Fruit,
    Seed,
    StemBark,

    // ===== Ecology =====
    Phenology,
    ReproductionDispersal,
    /// Served by the combined ecology/distribution page
    Distribution,

    // ===== Human uses =====
    Medicinal,
    Culinary,
    Handicrafts,
    Veterinary,
    Others,

    // ===== Conservation =====
    ConservationStatus,
    Reforestation,
}

/// The full static catalog, in fetch order
pub const CATALOG: [FragmentKind; 17] = [
    FragmentKind::Nomenclature,
    FragmentKind::Habit,
    FragmentKind::Leaf,
    FragmentKind::Flower,
    FragmentKind::Fruit,
    FragmentKind::Seed,
    FragmentKind::StemBark,
    FragmentKind::Phenology,
    FragmentKind::ReproductionDispersal,
    FragmentKind::Distribution,
    FragmentKind::Medicinal,
    FragmentKind::Culinary,
    FragmentKind::Handicrafts,
    FragmentKind::Veterinary,
    FragmentKind::Others,
    FragmentKind::ConservationStatus,
    FragmentKind::Reforestation,
];

impl FragmentKind {
    /// Returns every fragment kind in the catalog
    pub fn all() -> &'static [Self] {
        &CATALOG
    }

    /// The section group this fragment contributes to
    pub fn group(&self) -> SectionGroup {
        match self {
            Self::Nomenclature => SectionGroup::Nomenclature,
            Self::Habit
            | Self::Leaf
            | Self::Flower
            | Self::Fruit
            | Self::Seed
            | Self::StemBark => SectionGroup::Description,
            Self::Phenology | Self::ReproductionDispersal | Self::Distribution => {
                SectionGroup::Ecology
            }
            Self::Medicinal
            | Self::Culinary
            | Self::Handicrafts
            | Self::Veterinary
            | Self::Others => SectionGroup::HumanUses,
            Self::ConservationStatus | Self::Reforestation => SectionGroup::Conservation,
        }
    }

    /// The slot name inside the group
    pub fn slot(&self) -> &'static str {
        match self {
            Self::Nomenclature => "_complete",
            Self::Habit => "habit",
            Self::Leaf => "leaf",
            Self::Flower => "flower",
            Self::Fruit => "fruit",
            Self::Seed => "seed",
            Self::StemBark => "stem_bark",
            Self::Phenology => "phenology",
            Self::ReproductionDispersal => "reproduction_dispersal",
            Self::Distribution => "distribution",
            Self::Medicinal => "medicinal",
            Self::Culinary => "culinary",
            Self::Handicrafts => "handicrafts",
            Self::Veterinary => "veterinary",
            Self::Others => "others",
            Self::ConservationStatus => "status",
            Self::Reforestation => "reforestation",
        }
    }

    /// Dotted `group.slot` key used in diagnostics and the status ledger
    pub fn key(&self) -> &'static str {
        match self {
            Self::Nomenclature => "nomenclature._complete",
            Self::Habit => "description.habit",
            Self::Leaf => "description.leaf",
            Self::Flower => "description.flower",
            Self::Fruit => "description.fruit",
            Self::Seed => "description.seed",
            Self::StemBark => "description.stem_bark",
            Self::Phenology => "ecology.phenology",
            Self::ReproductionDispersal => "ecology.reproduction_dispersal",
            Self::Distribution => "ecology.distribution",
            Self::Medicinal => "human_uses.medicinal",
            Self::Culinary => "human_uses.culinary",
            Self::Handicrafts => "human_uses.handicrafts",
            Self::Veterinary => "human_uses.veterinary",
            Self::Others => "human_uses.others",
            Self::ConservationStatus => "conservation.status",
            Self::Reforestation => "conservation.reforestation",
        }
    }

    /// Parses a dotted key back into a fragment kind
    ///
    /// Returns None if the key doesn't name a catalog entry.
    pub fn from_key(key: &str) -> Option<Self> {
        CATALOG.iter().copied().find(|kind| kind.key() == key)
    }

    /// Site-relative path of the page serving this fragment
    pub fn page_path(&self) -> &'static str {
        match self {
            Self::Nomenclature => "contents/nomenclature.php",
            Self::Habit => "contents/description-habit.php",
            Self::Leaf => "contents/description-leaf.php",
            Self::Flower => "contents/description-flower.php",
            Self::Fruit => "contents/description-fruit.php",
            Self::Seed => "contents/description-seed.php",
            Self::StemBark => "contents/description-stem.php",
            Self::Phenology => "contents/phenology.php",
            Self::ReproductionDispersal => "contents/reproduction.php",
            Self::Distribution => "contents/ecology-distribution.php",
            Self::Medicinal => "contents/medicinal.php",
            Self::Culinary => "contents/culinary.php",
            Self::Handicrafts => "contents/handicrafts.php",
            Self::Veterinary => "contents/veterinary.php",
            Self::Others => "contents/others.php",
            Self::ConservationStatus => "contents/status.php",
            Self::Reforestation => "contents/reforestation.php",
        }
    }
}

impl fmt::Display for FragmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
