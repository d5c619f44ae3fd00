use uuid::Uuid;

use super::geo::GeoPoint;
use crate::store::collections::RESTAURANTS;
use crate::store::document::{self, Document};
use crate::store::StoreError;

/// A restaurant storefront. The document id doubles as the owner's user id:
/// one owner account runs exactly one restaurant.
#[derive(Debug, Clone, PartialEq)]
pub struct Restaurant {
    pub id: Uuid,
    pub name: String,
    pub city: Option<String>,
    pub phone: Option<String>,
    pub logo_url: Option<String>,
    pub location: Option<GeoPoint>,
}

impl Restaurant {
    /// Converts a `restaurants/{ownerId}` document. Restaurant docs are
    /// written by onboarding tools outside this crate, so only the name is
    /// required; everything else defaults to absent.
    pub fn from_document(id: Uuid, doc: &Document) -> Result<Self, StoreError> {
        let name = document::get_string(doc, "name")
            .ok_or_else(|| StoreError::decode(RESTAURANTS, "name field missing"))?;
        let location = doc
            .get("location")
            .and_then(|v| serde_json::from_value(v.clone()).ok());
        Ok(Self {
            id,
            name,
            city: document::get_string(doc, "city"),
            phone: document::get_string(doc, "phone"),
            logo_url: document::get_string(doc, "logoUrl"),
            location,
        })
    }

    pub fn to_document(&self) -> Document {
        let mut doc = Document::new();
        doc.insert("name".into(), self.name.clone().into());
        if let Some(city) = &self.city {
            doc.insert("city".into(), city.clone().into());
        }
        if let Some(phone) = &self.phone {
            doc.insert("phone".into(), phone.clone().into());
        }
        if let Some(logo_url) = &self.logo_url {
            doc.insert("logoUrl".into(), logo_url.clone().into());
        }
        if let Some(location) = &self.location {
            if let Ok(value) = serde_json::to_value(location) {
                doc.insert("location".into(), value);
            }
        }
        doc
    }
}
