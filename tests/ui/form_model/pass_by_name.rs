use artisan_form::form::{FieldKey, FieldValue, FormError, FormValues};
use rust_decimal::Decimal;

#[derive(Clone, artisan_form::form::FormModel)]
struct ProductForm {
    title: String,
    price: Decimal,
    in_stock: bool,
    tags: Vec<String>,
}

fn main() {
    let mut model = ProductForm {
        title: String::new(),
        price: Decimal::ZERO,
        in_stock: false,
        tags: Vec::new(),
    };
    assert_eq!(model.field_keys().len(), 4);

    model
        .set_field(&FieldKey::new("price"), FieldValue::Number(Decimal::new(1999, 2)))
        .expect("price accepts numbers");
    assert_eq!(model.price, Decimal::new(1999, 2));
    assert_eq!(
        model.field(&FieldKey::new("in_stock")),
        Some(FieldValue::Bool(false))
    );

    let mismatch = model.set_field(&FieldKey::new("in_stock"), FieldValue::from("yes"));
    assert!(matches!(mismatch, Err(FormError::TypeMismatch { .. })));
    let unknown = model.set_field(&FieldKey::new("sku"), FieldValue::Null);
    assert!(matches!(unknown, Err(FormError::UnknownField(_))));
    let _ = (&model.title, &model.tags);
}
