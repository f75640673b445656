use contact_book_lib::{AppConfig, AppTheme, ContactApp, SaveOutcome, SortOrder};
use std::time::Duration;

fn config_in(dir: &tempfile::TempDir) -> AppConfig {
    AppConfig {
        subscription_grace: Duration::from_millis(200),
        ..AppConfig::default().with_data_dir(dir.path())
    }
}

async fn add_contact(app: &ContactApp, name: &str, phone: &str, email: &str) {
    app.controller.begin_add_contact().await.expect("begin add");
    app.controller.change_draft_name(name).await.expect("name");
    app.controller.change_draft_phone(phone).await.expect("phone");
    app.controller.change_draft_email(email).await.expect("email");
    assert_eq!(
        app.controller.save_or_update().await.expect("save"),
        SaveOutcome::Submitted
    );
}

#[tokio::test]
async fn contacts_survive_reopen_and_list_in_name_order() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = config_in(&dir);

    {
        let app = ContactApp::open(&config).expect("open");
        let mut observer = app.controller.observe();
        add_contact(&app, "bob", "555-0101", "").await;
        observer
            .wait_for(|state| !state.dialog_open && state.filtered_contacts.len() == 1)
            .await
            .expect("bob saved");
        add_contact(&app, "Ann", "555-0102", "ann@example.com").await;
        observer
            .wait_for(|state| !state.dialog_open && state.filtered_contacts.len() == 2)
            .await
            .expect("ann saved");
        app.shutdown();
    }

    let app = ContactApp::open(&config).expect("reopen");
    assert!(app.database_path().exists());
    let mut observer = app.controller.observe();
    let state = observer
        .wait_for(|state| state.filtered_contacts.len() == 2)
        .await
        .expect("contacts reloaded");
    let names: Vec<_> = state.filtered_contacts.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Ann", "bob"]);
    assert_eq!(state.filtered_contacts[0].email.as_deref(), Some("ann@example.com"));
    assert_eq!(state.filtered_contacts[1].email, None);
}

#[tokio::test]
async fn search_sort_edit_and_delete_against_sqlite() {
    let dir = tempfile::tempdir().expect("tempdir");
    let app = ContactApp::open(&config_in(&dir)).expect("open");
    let mut observer = app.controller.observe();

    add_contact(&app, "Alice", "100", "").await;
    observer.wait_for(|s| !s.dialog_open && s.filtered_contacts.len() == 1).await.expect("alice");
    add_contact(&app, "Bob", "555", "").await;
    observer.wait_for(|s| !s.dialog_open && s.filtered_contacts.len() == 2).await.expect("bob");
    add_contact(&app, "Carol", "5550", "carol@mail.org").await;
    observer.wait_for(|s| !s.dialog_open && s.filtered_contacts.len() == 3).await.expect("carol");

    app.controller.set_search_query("555").await.expect("search");
    app.controller.toggle_sort_order().await.expect("sort");
    let state = app.controller.snapshot();
    assert_eq!(state.sort_order, SortOrder::Descending);
    let names: Vec<_> = state.filtered_contacts.iter().map(|c| c.name.clone()).collect();
    assert_eq!(names, vec!["Carol", "Bob"]);

    let bob = state.filtered_contacts[1].clone();
    app.controller.begin_edit_contact(&bob).await.expect("edit");
    app.controller.change_draft_phone("777").await.expect("phone");
    assert_eq!(app.controller.save_or_update().await.expect("save"), SaveOutcome::Submitted);
    let state = observer
        .wait_for(|s| !s.dialog_open && s.filtered_contacts.len() == 1)
        .await
        .expect("bob no longer matches");
    assert_eq!(state.filtered_contacts[0].name, "Carol");

    app.controller.set_search_query("").await.expect("clear search");
    let carol = app.controller.snapshot().filtered_contacts[0].clone();
    assert_eq!(carol.name, "Carol");
    app.controller.begin_edit_contact(&carol).await.expect("edit carol");
    app.controller.request_delete(&carol).await.expect("request");
    assert_eq!(app.controller.name_to_delete(), "Carol");
    app.controller.confirm_delete().await.expect("confirm");

    let state = observer
        .wait_for(|s| s.filtered_contacts.len() == 2 && !s.dialog_open)
        .await
        .expect("carol deleted and editor dismissed");
    assert!(!state.delete_confirm_open);
    assert!(state.storage_error.is_none());
}

#[tokio::test]
async fn view_preferences_persist_across_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = config_in(&dir);

    {
        let app = ContactApp::open(&config).expect("open");
        app.controller.toggle_layout().await.expect("layout");
        app.controller.cycle_theme().await.expect("theme");
        app.controller.cycle_theme().await.expect("theme");
        let state = app.controller.snapshot();
        assert!(state.is_grid_layout);
        assert_eq!(state.theme, AppTheme::Teal);

        let mut stored = app.preferences.subscribe();
        stored
            .wait_for(|prefs| prefs.is_grid_layout && prefs.theme == AppTheme::Teal)
            .await
            .expect("preferences written");
        app.shutdown();
    }

    let app = ContactApp::open(&config).expect("reopen");
    let state = app.controller.snapshot();
    assert!(state.is_grid_layout);
    assert_eq!(state.theme, AppTheme::Teal);
}
