use artisan_form::form::{FieldLens, FormModel};

#[derive(Clone, artisan_form::form::FormModel)]
struct ListingForm {
    title: String,
}

fn main() {
    let fields = ListingForm::fields();
    let lens = fields.title();
    let mut model = ListingForm {
        title: "Oak stool".to_string(),
    };
    lens.set(&mut model, "Ash stool".to_string());
    assert_eq!(lens.key().as_str(), "title");
    assert_eq!(lens.get(&model), "Ash stool");
}
