use catalog::CountryRisk;
use foundation::CountryId;

pub const SELECTED: &str = "country.selected";
pub const DESELECTED: &str = "country.deselected";

/// Outcome of a pick, resolved against the live store.
///
/// `country` is `None` for an explicit deselect and for picks whose id is no
/// longer known; `requested` keeps the id that was asked for, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionEvent {
    pub requested: Option<CountryId>,
    pub country: Option<CountryRisk>,
}

impl SelectionEvent {
    pub fn selected(country: CountryRisk) -> Self {
        Self {
            requested: Some(country.id),
            country: Some(country),
        }
    }

    pub fn deselected(requested: Option<CountryId>) -> Self {
        Self {
            requested,
            country: None,
        }
    }

    pub fn is_deselect(&self) -> bool {
        self.country.is_none()
    }

    pub fn kind(&self) -> &'static str {
        if self.is_deselect() { DESELECTED } else { SELECTED }
    }
}
