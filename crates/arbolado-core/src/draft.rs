//! Registration and edit forms, and the rules they are checked against.
//!
//! A [`TreeDraft`] is form state: strings as typed, coordinates as read from
//! the device. Validation turns it into a [`ValidatedDraft`] or reports the
//! first offending field.

use serde_json::{Map, Value};
use time::Date;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

use crate::error::InvalidField;
use crate::geo::Coordinates;
use crate::identity::{Creator, SectorId, SpeciesId};
use crate::tree::Tree;

const BIRTH_DATE_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]");

/// Registration form state.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TreeDraft {
    pub code: String,
    pub species_id: String,
    /// Empty when the user did not pick one; resolved from the position.
    pub sector_id: String,
    /// `YYYY-MM-DD`, or empty when unknown.
    pub date_birth: String,
    /// Centimeters, as typed.
    pub diameter: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl TreeDraft {
    pub fn is_blank(&self) -> bool {
        *self == Self::default()
    }

    /// Checks the draft against the registration rules, in form order.
    pub fn validate(&self, today: Date) -> Result<ValidatedDraft, InvalidField> {
        let code = self.code.trim();
        if code.is_empty() {
            return Err(InvalidField::new("code", "required"));
        }

        let species_raw = self.species_id.trim();
        if species_raw.is_empty() {
            return Err(InvalidField::new("speciesId", "required"));
        }
        let species_id = SpeciesId::parse(species_raw)
            .map_err(|err| InvalidField::new("speciesId", err.to_string()))?;

        let sector_raw = self.sector_id.trim();
        let sector_id = if sector_raw.is_empty() {
            None
        } else {
            Some(
                SectorId::parse(sector_raw)
                    .map_err(|err| InvalidField::new("sectorId", err.to_string()))?,
            )
        };

        let date_birth = parse_birth_date(&self.date_birth, today)?;
        let diameter_cm = parse_diameter(&self.diameter)?;

        let (Some(latitude), Some(longitude)) = (self.latitude, self.longitude) else {
            return Err(InvalidField::new("location", "required"));
        };
        let position = Coordinates::new(latitude, longitude)?;

        Ok(ValidatedDraft {
            code: code.to_string(),
            species_id,
            sector_id,
            date_birth,
            diameter_cm,
            position,
        })
    }
}

fn parse_birth_date(raw: &str, today: Date) -> Result<Option<Date>, InvalidField> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    let date = Date::parse(raw, BIRTH_DATE_FORMAT)
        .map_err(|_| InvalidField::new("dateBirth", format!("`{raw}` is not YYYY-MM-DD")))?;
    if date > today {
        return Err(InvalidField::new("dateBirth", "is in the future"));
    }
    Ok(Some(date))
}

fn parse_diameter(raw: &str) -> Result<f64, InvalidField> {
    let raw = raw.trim().replace(',', ".");
    if raw.is_empty() {
        return Err(InvalidField::new("diameter", "required"));
    }
    let value: f64 = raw
        .parse()
        .map_err(|_| InvalidField::new("diameter", format!("`{raw}` is not a number")))?;
    check_diameter(value)
}

fn check_diameter(value: f64) -> Result<f64, InvalidField> {
    if !value.is_finite() || value <= 0.0 {
        return Err(InvalidField::new("diameter", "must be a positive number of centimeters"));
    }
    Ok(value)
}

pub fn format_birth_date(date: Date) -> String {
    // The format only has numeric components; formatting cannot fail.
    date.format(BIRTH_DATE_FORMAT).unwrap_or_default()
}

/// A draft that passed validation.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidatedDraft {
    pub code: String,
    pub species_id: SpeciesId,
    pub sector_id: Option<SectorId>,
    pub date_birth: Option<Date>,
    pub diameter_cm: f64,
    pub position: Coordinates,
}

/// What the registration pipeline adds on top of the form.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Provenance {
    pub sector_id: Option<SectorId>,
    pub image_url: Option<String>,
    pub address: Option<String>,
    /// RFC 3339 timestamp used for both `registerDate` and `modifyDate`.
    pub registered_at: String,
}

impl ValidatedDraft {
    pub fn into_tree(self, creator: &Creator, provenance: Provenance) -> Tree {
        Tree {
            species_id: Some(self.species_id),
            sector_id: self.sector_id.or(provenance.sector_id),
            code: self.code,
            date_birth: self.date_birth.map(format_birth_date),
            register_date: Some(provenance.registered_at.clone()),
            modify_date: Some(provenance.registered_at),
            delete_date: None,
            diameter: Some(self.diameter_cm),
            latitude: Some(self.position.latitude),
            longitude: Some(self.position.longitude),
            address: provenance.address,
            image_url: provenance.image_url,
            created_by: Some(creator.as_str().to_string()),
        }
    }
}

/// Partial edit of an existing tree. `None` leaves the stored field alone.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TreePatch {
    pub code: Option<String>,
    pub species_id: Option<SpeciesId>,
    pub sector_id: Option<SectorId>,
    pub date_birth: Option<Date>,
    pub diameter_cm: Option<f64>,
    pub position: Option<Coordinates>,
    pub address: Option<String>,
    pub image_url: Option<String>,
}

impl TreePatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn validate(&self, today: Date) -> Result<(), InvalidField> {
        if let Some(code) = &self.code
            && code.trim().is_empty()
        {
            return Err(InvalidField::new("code", "required"));
        }
        if let Some(date) = self.date_birth
            && date > today
        {
            return Err(InvalidField::new("dateBirth", "is in the future"));
        }
        if let Some(diameter) = self.diameter_cm {
            check_diameter(diameter)?;
        }
        Ok(())
    }

    /// Wire fields to merge into the stored document, `modifyDate` included.
    pub fn into_fields(self, modified_at: &str) -> Map<String, Value> {
        let mut fields = Map::new();
        if let Some(code) = self.code {
            fields.insert("code".into(), Value::String(code.trim().to_string()));
        }
        if let Some(id) = self.species_id {
            fields.insert("speciesId".into(), Value::String(id.into()));
        }
        if let Some(id) = self.sector_id {
            fields.insert("sectorId".into(), Value::String(id.into()));
        }
        if let Some(date) = self.date_birth {
            fields.insert("dateBirth".into(), Value::String(format_birth_date(date)));
        }
        if let Some(diameter) = self.diameter_cm {
            fields.insert("diameter".into(), Value::from(diameter));
        }
        if let Some(position) = self.position {
            fields.insert("latitude".into(), Value::from(position.latitude));
            fields.insert("longitude".into(), Value::from(position.longitude));
        }
        if let Some(address) = self.address {
            fields.insert("address".into(), Value::String(address));
        }
        if let Some(url) = self.image_url {
            fields.insert("imageUrl".into(), Value::String(url));
        }
        fields.insert("modifyDate".into(), Value::String(modified_at.to_string()));
        fields
    }
}
