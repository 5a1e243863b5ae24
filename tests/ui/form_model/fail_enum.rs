use artisan_form::form::FormModel;

#[derive(Clone, FormModel)]
enum ListingStatus {
    Draft,
}

fn main() {
    let _ = ListingStatus::Draft;
}
