use storage::{database_url_for_path, StateStore, Storage};

#[tokio::test]
async fn state_survives_reopening_the_database_file() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("nested").join("client.sqlite3");
    let database_url = database_url_for_path(&db_path);

    {
        let storage = Storage::new(&database_url).await.expect("open");
        storage
            .put_value("auth-storage", r#"{"state":{"user":null,"isAuthenticated":false},"version":0}"#)
            .await
            .expect("put");
        storage.pool().close().await;
    }

    assert!(db_path.exists(), "database file should exist: {}", db_path.display());

    let reopened = Storage::new(&database_url).await.expect("reopen");
    let value = reopened.get_value("auth-storage").await.expect("get");
    assert!(value.expect("persisted value").contains("isAuthenticated"));
}
