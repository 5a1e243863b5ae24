use artisan_form::form::FormModel;

#[derive(Clone, FormModel)]
struct DraftForm<T> {
    value: T,
}

fn main() {
    let draft = DraftForm { value: 1 };
    let _ = draft.value;
}
