//! Tests for site, drive and library resolution and file link lookup.

use std::time::Duration;

use mockito::{Matcher, Server};
use serde_json::json;
use sp_linker::models::{Drive, SiteList};
use sp_linker::sharepoint::{
    get_file_web_url, list_drives, list_lists, normalize_path, pick_default_drive,
    pick_document_library, resolve_site,
};
use sp_linker::{GraphClient, GraphError};

fn client_for(server: &Server) -> GraphClient {
    GraphClient::new(server.url(), "test-token", Duration::from_secs(5)).unwrap()
}

fn drive(id: &str, name: &str) -> Drive {
    serde_json::from_value(json!({"id": id, "name": name})).unwrap()
}

fn list(id: &str, name: &str, template: &str) -> SiteList {
    serde_json::from_value(json!({"id": id, "name": name, "list": {"template": template}}))
        .unwrap()
}

mod default_drive {
    use super::*;

    #[test]
    fn prefers_documents_at_any_position() {
        for preferred in ["Documents", "shared documents", "SHARED DOCUMENTS"] {
            for position in 0..3 {
                let mut drives = vec![drive("a", "Archive"), drive("b", "Site Assets")];
                drives.insert(position, drive("pick", preferred));

                let (id, name) = pick_default_drive(&drives).unwrap();
                assert_eq!(id, "pick");
                assert_eq!(name, preferred);
            }
        }
    }

    #[test]
    fn falls_back_to_first() {
        let drives = vec![drive("a", "Archive"), drive("b", "Site Assets")];
        assert_eq!(
            pick_default_drive(&drives).unwrap(),
            ("a".to_string(), "Archive".to_string())
        );
    }

    #[test]
    fn unnamed_drive_defaults_to_documents() {
        let drives: Vec<Drive> = vec![serde_json::from_value(json!({"id": "x"})).unwrap()];
        assert_eq!(
            pick_default_drive(&drives).unwrap(),
            ("x".to_string(), "Documents".to_string())
        );
    }

    #[test]
    fn empty_is_not_found() {
        let err = pick_default_drive(&[]).unwrap_err();
        assert!(matches!(err, GraphError::NotFound(_)));
    }
}

mod document_library {
    use super::*;

    #[test]
    fn matches_preferred_name_case_insensitively() {
        let lists = vec![
            list("l1", "Documents", "documentLibrary"),
            list("l2", "Contracts", "documentLibrary"),
            list("l3", "Tasks", "genericList"),
        ];
        let found = pick_document_library(&lists, &[" contracts ", "Documents"]).unwrap();
        assert_eq!(found.id, "l2");
    }

    #[test]
    fn preference_order_wins_over_list_order() {
        let lists = vec![
            list("l1", "Shared Documents", "documentLibrary"),
            list("l2", "Documents", "documentLibrary"),
        ];
        let found = pick_document_library(&lists, &["Documents", "Shared Documents"]).unwrap();
        assert_eq!(found.id, "l2");
    }

    #[test]
    fn ignores_lists_that_are_not_libraries() {
        let lists = vec![
            list("l1", "Documents", "genericList"),
            list("l2", "Reports", "documentLibrary"),
        ];
        let found = pick_document_library(&lists, &["Documents"]).unwrap();
        assert_eq!(found.id, "l2");
    }

    #[test]
    fn returns_member_of_library_subset() {
        let lists = vec![
            list("l1", "Tasks", "genericList"),
            list("l2", "Reports", "documentLibrary"),
            list("l3", "Calendar", "events"),
        ];
        let none: [&str; 0] = [];
        let found = pick_document_library(&lists, &none).unwrap();
        assert_eq!(found.template(), Some("documentLibrary"));
    }

    #[test]
    fn fails_without_any_library() {
        let lists = vec![
            list("l1", "Tasks", "genericList"),
            serde_json::from_value(json!({"id": "l2", "name": "Documents"})).unwrap(),
        ];
        let err = pick_document_library(&lists, &["Documents"]).unwrap_err();
        assert!(matches!(err, GraphError::NotFound(_)));
        assert!(err.to_string().contains("documentLibrary"));
    }
}

mod path_normalization {
    use super::*;

    #[test]
    fn library_qualified_and_relative_agree() {
        let qualified = normalize_path("Shared Documents/Reports/Budget.xlsx", "Shared Documents");
        let relative = normalize_path("Reports/Budget.xlsx", "Shared Documents");
        assert_eq!(qualified, "Reports/Budget.xlsx");
        assert_eq!(relative, "Reports/Budget.xlsx");
        assert_eq!(normalize_path(&qualified, "Shared Documents"), qualified);
    }

    #[test]
    fn leading_slash_and_backslashes() {
        assert_eq!(
            normalize_path("/Documents\\Reports\\Budget.xlsx", "documents"),
            "Reports/Budget.xlsx"
        );
        assert_eq!(normalize_path("/Budget.xlsx", "Documents"), "Budget.xlsx");
    }
}

mod remote {
    use super::*;

    #[tokio::test]
    async fn resolves_site_id() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/sites/contoso.sharepoint.com:/sites/Finance")
            .match_query(Matcher::UrlEncoded(
                "$select".into(),
                "id,name,displayName".into(),
            ))
            .match_header("authorization", "Bearer test-token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id": "contoso.sharepoint.com,abc,def", "name": "Finance"}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let id = resolve_site(&client, "contoso.sharepoint.com", "/sites/Finance/")
            .await
            .unwrap();

        assert_eq!(id, "contoso.sharepoint.com,abc,def");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn missing_site_is_not_found() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/sites/contoso.sharepoint.com:/sites/Nope")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"error": {"code": "itemNotFound", "message": "Requested site could not be found"}}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let err = resolve_site(&client, "contoso.sharepoint.com", "sites/Nope")
            .await
            .unwrap_err();

        assert!(matches!(err, GraphError::NotFound(_)));
        assert!(err.to_string().contains("sites/Nope"));
    }

    #[tokio::test]
    async fn lists_drives_and_picks_default() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/sites/s1/drives")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "value": [
                        {"id": "d0", "name": "Site Assets"},
                        {"id": "d1", "name": "Documents", "driveType": "documentLibrary"}
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let drives = list_drives(&client, "s1").await.unwrap();
        assert_eq!(drives.len(), 2);
        assert_eq!(
            pick_default_drive(&drives).unwrap(),
            ("d1".to_string(), "Documents".to_string())
        );
    }

    #[tokio::test]
    async fn lists_libraries() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/sites/s1/lists")
            .match_query(Matcher::UrlEncoded(
                "$select".into(),
                "id,name,displayName,webUrl,list".into(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "value": [
                        {"id": "l1", "name": "Tasks", "list": {"template": "genericList"}},
                        {"id": "l2", "name": "Shared Documents", "list": {"template": "documentLibrary"}}
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let lists = list_lists(&client, "s1").await.unwrap();
        let library = pick_document_library(&lists, &["Documents", "Shared Documents"]).unwrap();
        assert_eq!(library.id, "l2");
    }

    #[tokio::test]
    async fn fetches_file_web_url_with_encoded_path() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/drives/d1/root:/Reports/Q1%20Budget.xlsx")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"id": "i1", "name": "Q1 Budget.xlsx", "webUrl": "https://contoso.sharepoint.com/sites/Finance/Shared%20Documents/Reports/Q1%20Budget.xlsx"}"#,
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let url = get_file_web_url(&client, "d1", "Reports/Q1 Budget.xlsx")
            .await
            .unwrap();

        assert!(url.ends_with("Reports/Q1%20Budget.xlsx"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/drives/d1/root:/missing.txt")
            .with_status(404)
            .with_body(r#"{"error": {"code": "itemNotFound"}}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let err = get_file_web_url(&client, "d1", "missing.txt")
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::NotFound(_)));
    }

    #[tokio::test]
    async fn forbidden_keeps_status_and_body() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/drives/d1/root:/secret.txt")
            .with_status(403)
            .with_body("accessDenied")
            .create_async()
            .await;

        let client = client_for(&server);
        let err = get_file_web_url(&client, "d1", "secret.txt")
            .await
            .unwrap_err();

        match err {
            GraphError::Http { status, body } => {
                assert_eq!(status, 403);
                assert_eq!(body, "accessDenied");
            }
            other => panic!("expected HTTP error, got {:?}", other),
        }
    }
}
