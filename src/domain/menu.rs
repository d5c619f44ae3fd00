use rust_decimal::Decimal;
use uuid::Uuid;

use crate::store::collections::MENU_ITEMS;
use crate::store::document::{self, Document};
use crate::store::StoreError;

/// A dish on a restaurant's menu. `owner_id` links the item to the
/// restaurant that sells it; legacy items written before the link existed
/// may lack it, which checkout compensates for at resolution time.
#[derive(Debug, Clone, PartialEq)]
pub struct MenuItem {
    pub id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub desc: Option<String>,
    pub image_url: Option<String>,
    pub available: bool,
    pub owner_id: Option<Uuid>,
}

impl MenuItem {
    /// Converts a `menuItems/{id}` document. Menu docs come from the owner
    /// dashboard and older imports, so prices are accepted as JSON numbers or
    /// numeric strings. A missing name or price rejects the item; a missing
    /// availability flag hides it rather than selling something unknown.
    pub fn from_document(id: Uuid, doc: &Document) -> Result<Self, StoreError> {
        let name = document::get_string(doc, "name")
            .ok_or_else(|| StoreError::decode(MENU_ITEMS, "name field missing"))?;
        let price = document::get_decimal(doc, "price")
            .ok_or_else(|| StoreError::decode(MENU_ITEMS, "price missing or unreadable"))?;
        Ok(Self {
            id,
            name,
            price,
            desc: document::get_string(doc, "desc"),
            image_url: document::get_string(doc, "imageUrl"),
            available: document::get_bool(doc, "available").unwrap_or(false),
            owner_id: document::get_uuid(doc, "ownerId"),
        })
    }

    pub fn to_document(&self) -> Document {
        let mut doc = Document::new();
        doc.insert("name".into(), self.name.clone().into());
        doc.insert("price".into(), self.price.to_string().into());
        doc.insert("available".into(), self.available.into());
        if let Some(desc) = &self.desc {
            doc.insert("desc".into(), desc.clone().into());
        }
        if let Some(image_url) = &self.image_url {
            doc.insert("imageUrl".into(), image_url.clone().into());
        }
        if let Some(owner_id) = &self.owner_id {
            doc.insert("ownerId".into(), owner_id.to_string().into());
        }
        doc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Document {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("fixture must be an object"),
        }
    }

    #[test]
    fn price_is_read_from_number_or_string() {
        let id = Uuid::new_v4();
        let owner = Uuid::new_v4();
        let a = MenuItem::from_document(
            id,
            &doc(json!({ "name": "Qofte", "price": 4.5, "available": true, "ownerId": owner.to_string() })),
        )
        .unwrap();
        let b = MenuItem::from_document(
            id,
            &doc(json!({ "name": "Qofte", "price": "4.5", "available": true, "ownerId": owner.to_string() })),
        )
        .unwrap();
        assert_eq!(a.price, Decimal::new(45, 1));
        assert_eq!(a.price, b.price);
        assert_eq!(a.owner_id, Some(owner));
    }

    #[test]
    fn unpriced_item_is_rejected() {
        let res = MenuItem::from_document(
            Uuid::new_v4(),
            &doc(json!({ "name": "Mystery dish", "available": true })),
        );
        assert!(res.is_err());
    }

    #[test]
    fn missing_availability_hides_the_item() {
        let item = MenuItem::from_document(
            Uuid::new_v4(),
            &doc(json!({ "name": "Byrek", "price": 2 })),
        )
        .unwrap();
        assert!(!item.available);
        assert_eq!(item.owner_id, None);
    }
}
