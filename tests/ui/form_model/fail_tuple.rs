use artisan_form::form::FormModel;

#[derive(Clone, FormModel)]
struct PriceForm(i64);

fn main() {
    let _ = PriceForm(1).0;
}
