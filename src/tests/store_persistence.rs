#[cfg(test)]
mod tests {
    use std::fs;

    use crate::store::{FileStore, PersistedState, TokenStore};
    use crate::tests::common::{authorized_state, location_credential};
    use crate::StoreError;

    fn full_state() -> PersistedState {
        let mut state = authorized_state();
        for id in ["loc_1", "loc_2"] {
            state
                .locations
                .insert(id.to_owned(), location_credential(id, &format!("{}-token", id), 86_400));
        }
        state
    }

    #[tokio::test]
    async fn missing_file_loads_as_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("tokens.json"));

        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_then_load_keeps_every_field() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested").join("tokens.json"));
        let state = full_state();

        store.save(&state).await.unwrap();
        let loaded = store.load().await.unwrap().expect("state saved");
        assert_eq!(loaded, state);

        // saving what was loaded writes the same document again
        let first = fs::read(store.path()).unwrap();
        store.save(&loaded).await.unwrap();
        let second = fs::read(store.path()).unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn document_shape_is_company_plus_location_map() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("tokens.json"));
        store.save(&full_state()).await.unwrap();

        let raw: serde_json::Value = serde_json::from_slice(&fs::read(store.path()).unwrap()).unwrap();
        assert_eq!(raw["company"]["company_id"], "company_1");
        assert_eq!(raw["locations"]["loc_1"]["access_token"], "loc_1-token");
        // RFC 3339 UTC
        let expires_at = raw["company"]["expires_at"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(expires_at).is_ok());
    }

    #[tokio::test]
    async fn save_is_atomic_and_private() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        let store = FileStore::new(&path);

        store.save(&full_state()).await.unwrap();
        store.save(&authorized_state()).await.unwrap();

        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["tokens.json".to_owned()], "no tmp file left behind");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
            assert_eq!(mode, 0o600, "permissions mismatch (expected 0600)");
        }
    }

    #[tokio::test]
    async fn corrupt_document_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        fs::write(&path, "{ not json").unwrap();

        let err = FileStore::new(&path).load().await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn empty_document_defaults_both_tiers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        fs::write(&path, "{}").unwrap();

        let loaded = FileStore::new(&path).load().await.unwrap().unwrap();
        assert!(loaded.is_empty());
    }
}
