use serde::Serialize;

/// Incubation presets offered on the species selection screen.
///
/// The device owns the actual profile behind each name; the panel only sends
/// the name through `setMode`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Species {
    Chicken,
    Duck,
    Quail,
    Goose,
    Custom,
}

impl Species {
    pub const ALL: [Species; 5] = [
        Species::Chicken,
        Species::Duck,
        Species::Quail,
        Species::Goose,
        Species::Custom,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Species::Chicken => "Chicken",
            Species::Duck => "Duck",
            Species::Quail => "Quail",
            Species::Goose => "Goose",
            Species::Custom => "Custom",
        }
    }
}
