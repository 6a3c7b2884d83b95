use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An awardable item tied to a drawing.
///
/// `rank` is unique within a drawing and orders the award sequence;
/// `quantity` is the number of winners this prize pays out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prize {
    pub id: Uuid,
    pub drawing_id: Uuid,
    pub rank: u32,
    pub quantity: u32,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewPrize {
    pub drawing_id: Uuid,
    pub rank: u32,
    pub quantity: u32,
    pub name: String,
    pub description: Option<String>,
}

impl Prize {
    pub fn from_new(new: NewPrize) -> Self {
        Self {
            id: Uuid::new_v4(),
            drawing_id: new.drawing_id,
            rank: new.rank,
            quantity: new.quantity.max(1),
            name: new.name,
            description: new.description,
        }
    }
}
