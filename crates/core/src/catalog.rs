//! The fixed product catalog.
//!
//! The shop sells five Devgad Alphonso packs. The list is compiled in and never
//! changes at runtime; orders snapshot whatever they need from it.

use std::sync::LazyLock;

use serde::Serialize;

use crate::types::{Price, ProductId};

/// A purchasable product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub name: &'static str,
    pub name_marathi: &'static str,
    pub description: &'static str,
    pub description_marathi: &'static str,
    pub price: Price,
    /// Pack size label, e.g. "12 pieces (3-3.5 kg)".
    pub weight: &'static str,
    /// Image asset slug; static asset serving is out of scope.
    pub image: &'static str,
}

static CATALOG: LazyLock<[Product; 5]> = LazyLock::new(|| {
    [
        Product {
            id: ProductId::new("royal-hapus"),
            name: "Royal Hapus",
            name_marathi: "रॉयल हापूस",
            description: "Our premium grade Alphonso mangoes. Extra large size with intense sweetness and rich golden color. Perfect for gifting.",
            description_marathi: "आमचे प्रीमियम दर्जाचे हापूस आंबे. अतिशय मोठा आकार, तीव्र गोडवा आणि समृद्ध सोनेरी रंग. भेटवस्तूसाठी उत्तम.",
            price: Price::rupees(1800),
            weight: "12 pieces (3-3.5 kg)",
            image: "mango-royal.jpg",
        },
        Product {
            id: ProductId::new("classic-hapus"),
            name: "Classic Hapus",
            name_marathi: "क्लासिक हापूस",
            description: "Traditional Devgad Alphonso with perfect balance of sweetness and tanginess. The authentic family favorite.",
            description_marathi: "गोडवा आणि आंबटपणाचा परिपूर्ण समतोल असलेला पारंपारिक देवगड हापूस. खरा कुटुंबाचा आवडता.",
            price: Price::rupees(1500),
            weight: "12 pieces (2.5-3 kg)",
            image: "mango-classic.jpg",
        },
        Product {
            id: ProductId::new("premium-box"),
            name: "Premium Gift Box",
            name_marathi: "प्रीमियम गिफ्ट बॉक्स",
            description: "Elegantly packed selection of our finest mangoes in a beautiful gift box. Ideal for corporate gifting and special occasions.",
            description_marathi: "सुंदर गिफ्ट बॉक्समध्ये आमच्या उत्कृष्ट आंब्यांचे सुंदर पॅकेज. कॉर्पोरेट भेटवस्तू आणि विशेष प्रसंगांसाठी आदर्श.",
            price: Price::rupees(2500),
            weight: "12 pieces (4 kg)",
            image: "mango-giftbox.jpg",
        },
        Product {
            id: ProductId::new("family-pack"),
            name: "Family Pack",
            name_marathi: "फॅमिली पॅक",
            description: "Value pack perfect for families. Medium-sized mangoes with the same authentic Devgad taste at a great price.",
            description_marathi: "कुटुंबांसाठी उत्तम व्हॅल्यू पॅक. उत्तम किमतीत समान खरी देवगड चव असलेले मध्यम आकाराचे आंबे.",
            price: Price::rupees(1200),
            weight: "12 pieces (2-2.5 kg)",
            image: "mango-family.jpg",
        },
        Product {
            id: ProductId::new("aam-ras-special"),
            name: "Aam Ras Special",
            name_marathi: "आमरस स्पेशल",
            description: "Perfectly ripe mangoes ideal for making the most delicious Aamras. Soft, sweet, and extremely flavorful.",
            description_marathi: "सर्वात स्वादिष्ट आमरस बनवण्यासाठी आदर्श असे परिपूर्ण पिकलेले आंबे. मऊ, गोड आणि अत्यंत चवदार.",
            price: Price::rupees(1100),
            weight: "12 pieces (2-2.5 kg)",
            image: "mango-aamras.jpg",
        },
    ]
});

/// Every product, in display order.
#[must_use]
pub fn all() -> &'static [Product] {
    CATALOG.as_slice()
}

/// Look up a product by id.
#[must_use]
pub fn find(id: &ProductId) -> Option<&'static Product> {
    all().iter().find(|p| &p.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_has_five_unique_products() {
        let ids: std::collections::HashSet<_> = all().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids.len(), 5);
    }

    #[test]
    fn test_find() {
        let royal = find(&ProductId::new("royal-hapus"));
        assert_eq!(royal.map(|p| p.price), Some(Price::rupees(1800)));
        assert!(find(&ProductId::new("kesar")).is_none());
    }
}
