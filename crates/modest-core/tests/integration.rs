//! Integration tests for account configuration and local folders.
//!
//! These tests use an on-disk configuration database and a temporary
//! local folder tree.

use modest_core::account::{key, settings};
use modest_core::{
    AccountManager, ConfigStore, LocalFolderType, MailOperationQueue, OperationStatus,
    ProtocolInfo, QueueEvent, ServerAccountData, ServerRole, TransferFolder,
    TransportStoreProtocol, ensure_local_folders, maildir_path, validate_server_account,
};

#[tokio::test]
async fn test_accounts_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("modest.db");
    let db = db.to_str().unwrap();

    {
        let mgr = AccountManager::new(ConfigStore::new(db).await.unwrap());
        let mut imap = ServerAccountData::new(
            "mail.example.com",
            TransportStoreProtocol::Imap,
            "mail.example.com",
        );
        imap.username = "me".to_string();
        assert!(validate_server_account(&imap, ServerRole::Store).is_ok());
        mgr.add_server_account(&imap).await.unwrap();
        mgr.add_account("Me @ Example", "Example", Some("mail.example.com"), None)
            .await
            .unwrap();
    }

    let mgr = AccountManager::new(ConfigStore::new(db).await.unwrap());
    assert_eq!(
        mgr.account_names(true).await.unwrap(),
        vec!["Me @ Example".to_string()]
    );
    assert_eq!(
        mgr.get_default_account().await.unwrap(),
        Some("Me @ Example".to_string())
    );
    let data = mgr.account_data("Me @ Example").await.unwrap().unwrap();
    assert_eq!(data.store_account.unwrap().protocol.name(), "imap");
}

#[tokio::test]
async fn test_stored_keys_decompose_to_their_account() {
    let mgr = AccountManager::new(ConfigStore::in_memory().await.unwrap());
    mgr.add_account("a/b c", "Odd", None, None).await.unwrap();

    let dir = key::compose("a/b c", None, false).unwrap();
    let entries = mgr.store().list_entries(&dir).await.unwrap();
    assert!(entries.contains(&settings::DISPLAY_NAME.to_string()));
    assert!(entries.contains(&settings::ENABLED.to_string()));

    for entry in entries {
        let full = format!("{dir}/{entry}");
        let parts = AccountManager::account_from_key(&full).unwrap();
        assert_eq!(parts.account_name, "a/b c");
        assert!(parts.is_top_level);
        assert!(!parts.is_server_account);
    }
}

#[tokio::test]
async fn test_archive_folder_through_queue() {
    let dir = tempfile::tempdir().unwrap();
    let local = dir.path().join("local_folders");
    ensure_local_folders(&local).await.unwrap();

    let drafts = maildir_path(&local, LocalFolderType::Drafts).unwrap();
    let archive = maildir_path(&local, LocalFolderType::Archive).unwrap();
    tokio::fs::write(drafts.join("new/1.eml"), b"Subject: draft\r\n\r\nbody")
        .await
        .unwrap();

    let queue = MailOperationQueue::new();
    let mut events = queue.subscribe();
    let handle = queue.add(TransferFolder::copy(&drafts, &archive));
    let id = handle.id();
    assert_eq!(handle.wait().await.status, OperationStatus::Success);

    assert!(archive.join("drafts/new/1.eml").is_file());
    assert_eq!(
        LocalFolderType::from_name(archive.file_name().unwrap().to_str().unwrap()),
        LocalFolderType::Archive
    );

    let mut finished = false;
    while let Ok(event) = events.try_recv() {
        if let QueueEvent::Finished { id: done, status, .. } = event {
            assert_eq!(done, id);
            assert_eq!(status, OperationStatus::Success);
            finished = true;
        }
    }
    assert!(finished);
}
