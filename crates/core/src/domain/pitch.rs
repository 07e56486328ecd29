use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PitchId(pub String);

impl fmt::Display for PitchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A monitored venue. `path` and `city` locate the venue page on the booking
/// site and are only used to build links.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pitch {
    pub id: PitchId,
    pub name: String,
    pub path: String,
    pub city: String,
}

impl Pitch {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        path: impl Into<String>,
        city: impl Into<String>,
    ) -> Self {
        Self { id: PitchId(id.into()), name: name.into(), path: path.into(), city: city.into() }
    }
}

pub fn default_pitches() -> Vec<Pitch> {
    vec![
        Pitch::new(
            "34933",
            "Three Corners",
            "three-corners-adventure-playground/football-5-a-side-34933",
            "london",
        ),
        Pitch::new(
            "32208",
            "Finsbury Leisure Centre",
            "finsbury-leisure-centre/football-5-a-side-32208",
            "london",
        ),
        Pitch::new(
            "32180",
            "Calthorpe Project Sports Facilities",
            "calthorpe-project-sports-facilities/football-5-a-side-32180",
            "london",
        ),
    ]
}
