/// Named partition of a guild's settings. Each maps to one store table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Section {
    /// Bot behaviour settings (`config` command)
    Config,
    /// Per-command role overrides
    Access,
    /// Guild dictionary (`define` / `whatis`)
    Dict,
    /// Unit conversion rules
    Convert,
}

impl Section {
    pub const ALL: &'static [Self] = &[Self::Config, Self::Access, Self::Dict, Self::Convert];

    /// Store table backing this section.
    pub const fn table(self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Access => "access",
            Self::Dict => "dict",
            Self::Convert => "convert",
        }
    }
}
