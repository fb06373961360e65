//! Share-key fan-out across share, re-share, unshare and rename.

mod support;

use keyshare_crypto::{decrypt_content, DerivedKey, KdfParams, KeyCrypto, StandardCrypto};
use keyshare_lifecycle::layout;
use keyshare_lifecycle::{
    GroupId, ItemType, KeyError, ShareEvent, ShareGrant, ShareRequest,
};
use keyshare_storage::FileView;
use pretty_assertions::assert_eq;
use support::{uid, Fixture};

#[test]
fn owner_holds_the_only_share_key_of_a_new_file() {
    let fx = Fixture::new();
    let alice = fx.create_user("alice");
    let session = fx.login(&alice);

    fx.write_file(&alice, "/notes.txt", b"private");

    assert_eq!(fx.share_key_holders(&alice, "/notes.txt"), vec!["alice"]);
    assert_eq!(
        fx.lifecycle.read_file(&session, &alice, "/notes.txt").unwrap(),
        b"private"
    );
}

#[test]
fn shared_file_is_readable_by_the_recipient() {
    let fx = Fixture::new();
    let alice = fx.create_user("alice");
    let bob = fx.create_user("bob");
    let alice_session = fx.login(&alice);

    let id = fx.write_file(&alice, "/doc.txt", b"quarterly numbers");
    fx.share(
        &alice_session,
        &alice,
        id,
        ItemType::File,
        ShareGrant::User(bob.clone()),
        "/doc.txt",
        None,
    );

    assert_eq!(fx.share_key_holders(&alice, "/doc.txt"), vec!["alice", "bob"]);
    let bob_session = fx.login(&bob);
    assert_eq!(
        fx.lifecycle
            .read_file(&bob_session, &bob, "/Shared/doc.txt")
            .unwrap(),
        b"quarterly numbers"
    );
}

#[test]
fn share_keys_track_recipients_through_share_and_unshare() {
    let fx = Fixture::new();
    let alice = fx.create_user("alice");
    let bob = fx.create_user("bob");
    let carol = fx.create_user("carol");
    let session = fx.login(&alice);

    let team = fx.mkdir(&alice, "/team");
    fx.mkdir(&alice, "/team/q3");
    let plan = fx.write_file(&alice, "/team/plan.md", b"plan");
    fx.write_file(&alice, "/team/q3/budget.csv", b"1,2,3");
    fx.write_file(&alice, "/solo.txt", b"mine");
    let files = ["/team/plan.md", "/team/q3/budget.csv", "/solo.txt"];
    let check = || {
        for path in files {
            assert_eq!(
                fx.share_key_holders(&alice, path),
                fx.expected_holders(&alice, path),
                "share-keys of {path}"
            );
        }
    };

    let folder_share = fx.share(
        &session,
        &alice,
        team,
        ItemType::Folder,
        ShareGrant::User(bob.clone()),
        "/team",
        None,
    );
    check();
    let file_share = fx.share(
        &session,
        &alice,
        plan,
        ItemType::File,
        ShareGrant::User(carol.clone()),
        "/plan.md",
        None,
    );
    check();
    assert_eq!(
        fx.share_key_holders(&alice, "/team/plan.md"),
        vec!["alice", "bob", "carol"]
    );

    fx.unshare(&folder_share);
    check();
    assert_eq!(
        fx.share_key_holders(&alice, "/team/plan.md"),
        vec!["alice", "carol"]
    );
    assert_eq!(fx.share_key_holders(&alice, "/team/q3/budget.csv"), vec!["alice"]);

    fx.unshare(&file_share);
    check();
    assert_eq!(fx.share_key_holders(&alice, "/solo.txt"), vec!["alice"]);
}

#[test]
fn repeating_a_share_writes_nothing() {
    let fx = Fixture::new();
    let alice = fx.create_user("alice");
    let bob = fx.create_user("bob");
    let session = fx.login(&alice);

    let folder = fx.mkdir(&alice, "/docs");
    fx.write_file(&alice, "/docs/a.txt", b"a");
    fx.write_file(&alice, "/docs/b.txt", b"b");
    let record = fx.share(
        &session,
        &alice,
        folder,
        ItemType::Folder,
        ShareGrant::User(bob),
        "/docs",
        None,
    );

    let before = fx.view.mutation_count();
    let report = fx
        .lifecycle
        .post_share(&session, &ShareEvent::from(&record))
        .unwrap();
    assert_eq!(report.succeeded.len(), 2);
    assert_eq!(fx.view.mutation_count(), before);
}

#[test]
fn reshare_inside_a_shared_folder_resolves_to_the_owner() {
    let fx = Fixture::new();
    let alice = fx.create_user("alice");
    let bob = fx.create_user("bob");
    let carol = fx.create_user("carol");
    let alice_session = fx.login(&alice);

    let folder = fx.mkdir(&alice, "/b");
    fx.mkdir(&alice, "/b/c");
    let file = fx.write_file(&alice, "/b/c/d.txt", b"deep");
    let first = fx.share(
        &alice_session,
        &alice,
        folder,
        ItemType::Folder,
        ShareGrant::User(bob.clone()),
        "/b",
        None,
    );

    let bob_session = fx.login(&bob);
    let reshare = fx
        .dir
        .add_share(
            &bob,
            file,
            ItemType::File,
            ShareGrant::User(carol.clone()),
            "/d.txt",
            Some(first.id),
        )
        .unwrap();
    let event = ShareEvent::from(&reshare);
    assert_eq!(
        fx.lifecycle.resolver().share_view_path(&event).unwrap(),
        "/Shared/b/c/d.txt"
    );
    fx.lifecycle.post_share(&bob_session, &event).unwrap();

    assert_eq!(
        fx.share_key_holders(&alice, "/b/c/d.txt"),
        vec!["alice", "bob", "carol"]
    );
    let carol_session = fx.login(&carol);
    assert_eq!(
        fx.lifecycle
            .read_file(&carol_session, &carol, "/Shared/d.txt")
            .unwrap(),
        b"deep"
    );
}

#[test]
fn group_unshare_keeps_users_with_another_share() {
    let fx = Fixture::new();
    let alice = fx.create_user("alice");
    let bob = fx.create_user("bob");
    let carol = fx.create_user("carol");
    let session = fx.login(&alice);
    let staff = GroupId("staff".into());
    fx.dir.add_group(&staff, &[bob.clone(), carol.clone()]).unwrap();

    let doc = fx.write_file(&alice, "/doc.txt", b"memo");
    let group_share = fx.share(
        &session,
        &alice,
        doc,
        ItemType::File,
        ShareGrant::Group(staff),
        "/doc.txt",
        None,
    );
    fx.share(
        &session,
        &alice,
        doc,
        ItemType::File,
        ShareGrant::User(bob.clone()),
        "/doc.txt",
        None,
    );
    assert_eq!(
        fx.share_key_holders(&alice, "/doc.txt"),
        vec!["alice", "bob", "carol"]
    );

    fx.unshare(&group_share);
    assert_eq!(fx.share_key_holders(&alice, "/doc.txt"), vec!["alice", "bob"]);
}

#[test]
fn unsharing_a_user_keeps_their_group_access() {
    let fx = Fixture::new();
    let alice = fx.create_user("alice");
    let bob = fx.create_user("bob");
    let carol = fx.create_user("carol");
    let session = fx.login(&alice);
    let staff = GroupId("staff".into());
    fx.dir.add_group(&staff, &[bob.clone(), carol.clone()]).unwrap();

    let doc = fx.write_file(&alice, "/doc.txt", b"memo");
    let direct = fx.share(
        &session,
        &alice,
        doc,
        ItemType::File,
        ShareGrant::User(bob.clone()),
        "/doc.txt",
        None,
    );
    fx.share(
        &session,
        &alice,
        doc,
        ItemType::File,
        ShareGrant::Group(staff),
        "/doc.txt",
        None,
    );

    fx.unshare(&direct);
    assert_eq!(
        fx.share_key_holders(&alice, "/doc.txt"),
        vec!["alice", "bob", "carol"]
    );
    let bob_session = fx.login(&bob);
    assert_eq!(
        fx.lifecycle.read_file(&bob_session, &bob, "/Shared/doc.txt").unwrap(),
        b"memo"
    );
}

#[test]
fn folder_share_continues_past_a_broken_file() {
    let fx = Fixture::new();
    let alice = fx.create_user("alice");
    let bob = fx.create_user("bob");
    let session = fx.login(&alice);

    let folder = fx.mkdir(&alice, "/d");
    for name in ["a", "b", "c"] {
        fx.write_file(&alice, &format!("/d/{name}.txt"), name.as_bytes());
    }
    fx.view
        .write(&layout::share_key_path(&alice, "/d/b.txt", "alice"), b"not a share-key")
        .unwrap();

    let record = fx
        .dir
        .add_share(&alice, folder, ItemType::Folder, ShareGrant::User(bob.clone()), "/d", None)
        .unwrap();
    let err = fx
        .lifecycle
        .post_share(&session, &ShareEvent::from(&record))
        .unwrap_err();
    assert!(matches!(
        err,
        KeyError::PartialFanoutFailure { failed: 1, total: 3 }
    ));

    for path in ["/d/a.txt", "/d/c.txt"] {
        assert_eq!(fx.share_key_holders(&alice, path), vec!["alice", "bob"]);
    }
    let bob_session = fx.login(&bob);
    assert_eq!(
        fx.lifecycle.read_file(&bob_session, &bob, "/Shared/d/c.txt").unwrap(),
        b"c"
    );
}

#[test]
fn rename_moves_keys_and_keeps_the_content_key() {
    let fx = Fixture::new();
    let alice = fx.create_user("alice");
    let bob = fx.create_user("bob");
    let session = fx.login(&alice);

    fx.mkdir(&alice, "/a");
    let file = fx.write_file(&alice, "/a/x.txt", b"twelve bytes");
    fx.share(
        &session,
        &alice,
        file,
        ItemType::File,
        ShareGrant::User(bob),
        "/x.txt",
        None,
    );
    let before = fx.lifecycle.content_key(&session, &alice, "/a/x.txt").unwrap();

    fx.view
        .mkdir_all(&layout::user_file_path(&alice, "/z"))
        .unwrap();
    fx.view
        .rename(
            &layout::user_file_path(&alice, "/a"),
            &layout::user_file_path(&alice, "/z/a"),
        )
        .unwrap();
    fx.dir.move_path(&alice, "/a", "/z/a").unwrap();
    let report = fx
        .lifecycle
        .post_rename(&session, &alice, "/a", "/z/a")
        .unwrap();
    assert_eq!(report.succeeded, vec!["/z/a/x.txt".to_string()]);

    let after = fx
        .lifecycle
        .content_key(&session, &alice, "/z/a/x.txt")
        .unwrap();
    assert_eq!(before.as_bytes(), after.as_bytes());
    assert!(!fx.lifecycle.keys().has_keyfile(&alice, "/a/x.txt"));
    assert_eq!(
        fx.share_key_holders(&alice, "/z/a/x.txt"),
        vec!["alice", "bob"]
    );
    assert_eq!(fx.dir.unencrypted_size(&alice, "/z/a/x.txt").unwrap(), Some(12));
}

#[test]
fn single_file_rename_creates_key_directories() {
    let fx = Fixture::new();
    let alice = fx.create_user("alice");
    let session = fx.login(&alice);
    fx.write_file(&alice, "/x.txt", b"x");

    fx.view
        .mkdir_all(&layout::user_file_path(&alice, "/deep/er"))
        .unwrap();
    fx.view
        .rename(
            &layout::user_file_path(&alice, "/x.txt"),
            &layout::user_file_path(&alice, "/deep/er/y.txt"),
        )
        .unwrap();
    fx.lifecycle
        .post_rename(&session, &alice, "/x.txt", "/deep/er/y.txt")
        .unwrap();

    assert_eq!(
        fx.lifecycle
            .read_file(&session, &alice, "/deep/er/y.txt")
            .unwrap(),
        b"x"
    );
}

#[test]
fn share_to_user_without_keys_is_vetoed() {
    let fx = Fixture::new();
    let alice = fx.create_user("alice");
    fx.login(&alice);
    let doc = fx.write_file(&alice, "/doc.txt", b"d");
    let ghost = uid("ghost");

    let request = ShareRequest {
        item_type: ItemType::File,
        item_source: doc,
        grant: ShareGrant::User(ghost.clone()),
        uid_owner: alice.clone(),
    };
    match fx.lifecycle.pre_share(&request) {
        Err(KeyError::MissingPublicKey(user)) => assert_eq!(user, ghost),
        other => panic!("expected a veto, got {other:?}"),
    }

    fx.create_user("ghost");
    fx.lifecycle.pre_share(&request).unwrap();
}

#[test]
fn link_share_is_sealed_for_the_link_key() {
    let fx = Fixture::new();
    assert!(fx.lifecycle.bootstrap().unwrap());
    assert!(!fx.lifecycle.bootstrap().unwrap());

    let alice = fx.create_user("alice");
    let session = fx.login(&alice);
    let doc = fx.write_file(&alice, "/public.txt", b"hello world");
    fx.share(
        &session,
        &alice,
        doc,
        ItemType::File,
        ShareGrant::Link,
        "/public.txt",
        None,
    );
    assert_eq!(
        fx.share_key_holders(&alice, "/public.txt"),
        vec!["alice", "pubShare"]
    );

    // Anonymous access: unwrap the link key with the empty passphrase.
    let crypto = StandardCrypto::new(KdfParams::testing());
    let keys = fx.lifecycle.keys();
    let link = uid("pubShare");
    let wrapped = keys.system_private_key(&link).unwrap().unwrap();
    let sk = crypto.decrypt_private_key(&wrapped, "").unwrap();
    let sealed = keys.share_key(&alice, "/public.txt", &link).unwrap().unwrap();
    let envelope = DerivedKey::from_slice(&crypto.open(&sealed, &sk).unwrap()).unwrap();
    let keyfile = keys.keyfile(&alice, "/public.txt").unwrap().unwrap();
    let content_key = DerivedKey::from_slice(&crypto.unwrap(&envelope, &keyfile).unwrap()).unwrap();
    assert_eq!(
        decrypt_content(&content_key, &fx.raw_file(&alice, "/public.txt")).unwrap(),
        b"hello world"
    );
}

#[test]
fn files_on_mounted_storage_use_their_mount_path() {
    let fx = Fixture::new();
    let alice = fx.create_user("alice");
    let bob = fx.create_user("bob");
    let session = fx.login(&alice);

    fx.mkdir(&alice, "/ext");
    let id = fx
        .dir
        .add_file_mounted(&alice, "/ext/report.pdf", "/report.pdf")
        .unwrap();
    fx.lifecycle
        .encrypt_file(&alice, "/ext/report.pdf", b"%PDF")
        .unwrap();
    fx.share(
        &session,
        &alice,
        id,
        ItemType::File,
        ShareGrant::User(bob),
        "/report.pdf",
        None,
    );

    assert_eq!(
        fx.share_key_holders(&alice, "/ext/report.pdf"),
        vec!["alice", "bob"]
    );
}

#[test]
fn sharing_disabled_leaves_keys_alone() {
    let mut config = keyshare_lifecycle::EncryptionConfig::testing();
    config.sharing_enabled = false;
    let fx = Fixture::with_config(config);
    let alice = fx.create_user("alice");
    let bob = fx.create_user("bob");
    let session = fx.login(&alice);
    let doc = fx.write_file(&alice, "/doc.txt", b"d");

    let before = fx.view.mutation_count();
    fx.share(
        &session,
        &alice,
        doc,
        ItemType::File,
        ShareGrant::User(bob),
        "/doc.txt",
        None,
    );
    assert_eq!(fx.view.mutation_count(), before);
    assert_eq!(fx.share_key_holders(&alice, "/doc.txt"), vec!["alice"]);
}
