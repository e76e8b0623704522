use std::fs;

use serde_json::{json, Value};
use songbook_manager::db::{
    add_section, add_song, count_distinct_artists, create_layout, create_song, create_songbook,
    delete_song, fetch_papersizes, fetch_slots, fill_holes, find_or_create_artist, remove_item,
    update_layout,
};
use songbook_manager::export::export_songbook;
use songbook_manager::serializer::ContentEntry;
use songbook_manager::{
    describe_songbook, open_in_memory, Config, ItemRef, ItemKind, Layout, Orientation,
    SongDraft, SongLibrary, SongbookError,
};

struct Fixture {
    _dir: tempfile::TempDir,
    config: Config,
    library: SongLibrary,
    conn: rusqlite::Connection,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::with_data_dir(dir.path());
    let library = SongLibrary::new(&config.library_dir);
    Fixture {
        _dir: dir,
        config,
        library,
        conn: open_in_memory().unwrap(),
    }
}

fn song(fx: &Fixture, title: &str, artist: Option<&str>) -> songbook_manager::Song {
    let mut draft = SongDraft::new(title);
    if let Some(name) = artist {
        draft = draft.with_artist(find_or_create_artist(&fx.conn, name).unwrap().id);
    }
    let text = format!("\\beginsong{{{title}}}\n\\endsong\n");
    create_song(&fx.conn, &fx.library, &draft, &text).unwrap()
}

#[test]
fn songbook_content_follows_ranks() {
    let fx = fixture();
    let book = create_songbook(&fx.conn, "Campfire", "Summer\nedition", true, "alice").unwrap();
    let jude = song(&fx, "Hey Jude", Some("The Beatles"));
    let be = song(&fx, "Let It Be", Some("The Beatles"));
    let alouette = song(&fx, "Alouette", None);

    assert_eq!(add_song(&fx.conn, book.id, jude.id, None).unwrap().rank, 1);
    let (section, slot) = add_section(&fx.conn, book.id, "Rounds", None).unwrap();
    assert_eq!(slot.rank, 2);
    assert_eq!(add_song(&fx.conn, book.id, alouette.id, None).unwrap().rank, 3);
    // Explicit rank shared with the first song: ties keep insertion order.
    assert_eq!(add_song(&fx.conn, book.id, be.id, Some(1)).unwrap().rank, 1);

    let description = describe_songbook(&fx.conn, book.id).unwrap();
    assert_eq!(description.title, "Campfire");
    assert_eq!(description.author, "alice");
    assert_eq!(description.subtitle, "Summer%\r\n\\newline%\r\nedition");
    assert_eq!(
        description.content,
        vec![
            ContentEntry::Song(jude.file_path.clone()),
            ContentEntry::Song(be.file_path.clone()),
            ContentEntry::Section(section.name.to_string()),
            ContentEntry::Song(alouette.file_path.clone()),
        ]
    );
    assert_eq!(jude.file_path, "songs/hey-jude.sgc");

    // One artist plus the "no artist" bucket.
    assert_eq!(count_distinct_artists(&fx.conn, book.id).unwrap(), 2);
}

#[test]
fn holes_stay_until_filled() {
    let fx = fixture();
    let book = create_songbook(&fx.conn, "Rehearsal", "", false, "alice").unwrap();
    let first = song(&fx, "First", None);
    let second = song(&fx, "Second", None);
    let third = song(&fx, "Third", None);
    for id in [first.id, second.id, third.id] {
        add_song(&fx.conn, book.id, id, None).unwrap();
    }

    remove_item(&fx.conn, book.id, ItemRef::song(second.id)).unwrap();
    let ranks: Vec<i64> = fetch_slots(&fx.conn, book.id)
        .unwrap()
        .iter()
        .map(|slot| slot.rank)
        .collect();
    assert_eq!(ranks, vec![1, 3]);

    // Appending counts items, so the new rank collides with the old third.
    let fourth = song(&fx, "Fourth", None);
    assert_eq!(add_song(&fx.conn, book.id, fourth.id, None).unwrap().rank, 3);

    assert_eq!(fill_holes(&fx.conn, book.id).unwrap(), 1);
    let slots = fetch_slots(&fx.conn, book.id).unwrap();
    let order: Vec<(i64, i64)> = slots.iter().map(|s| (s.item.id, s.rank)).collect();
    assert_eq!(order, vec![(first.id, 1), (third.id, 2), (fourth.id, 3)]);
    assert_eq!(fill_holes(&fx.conn, book.id).unwrap(), 0);
}

#[test]
fn negative_rank_is_rejected() {
    let fx = fixture();
    let book = create_songbook(&fx.conn, "Camp", "", false, "alice").unwrap();
    let only = song(&fx, "Only", None);

    let err = add_song(&fx.conn, book.id, only.id, Some(-1)).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<SongbookError>(),
        Some(SongbookError::InvalidRank(-1))
    ));
    assert!(fetch_slots(&fx.conn, book.id).unwrap().is_empty());
}

#[test]
fn export_writes_songbook_and_layout() {
    let fx = fixture();
    let book = create_songbook(&fx.conn, "Camp Fire", "", true, "alice").unwrap();
    let jude = song(&fx, "Hey Jude", None);
    add_song(&fx.conn, book.id, jude.id, None).unwrap();
    add_section(&fx.conn, book.id, "Encore", None).unwrap();

    let a4 = fetch_papersizes(&fx.conn)
        .unwrap()
        .into_iter()
        .find(|paper| paper.name == "A4")
        .unwrap();
    let layout =
        create_layout(&fx.conn, &Layout::new("alice", a4, Orientation::Landscape)).unwrap();

    let path = export_songbook(&fx.conn, &fx.config, book.id, layout.id).unwrap();
    assert!(path.starts_with(&fx.config.export_dir));
    let file_name = path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(file_name.starts_with("camp-fire-"));
    assert!(file_name.ends_with(".json"));

    let job: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(
        job["songbook"]["content"],
        json!(["songs/hey-jude.sgc", ["songsection", "Encore"]])
    );
    assert_eq!(job["songbook"]["authwords"]["sep"], json!(["and", "et"]));
    assert_eq!(job["layout"]["orientation"], json!("landscape"));
    assert_eq!(job["layout"]["column_adjustment"], json!("one_more"));
    let geometry = job["layout"]["geometry"].as_str().unwrap();
    assert!(geometry.starts_with("paperwidth=297mm,\n  paperheight=210mm,\n  asymmetric"));
}

#[test]
fn layout_without_orientation_cannot_export() {
    let fx = fixture();
    let book = create_songbook(&fx.conn, "Camp", "", false, "alice").unwrap();
    let a5 = fetch_papersizes(&fx.conn)
        .unwrap()
        .into_iter()
        .find(|paper| paper.name == "A5")
        .unwrap();
    let mut layout =
        create_layout(&fx.conn, &Layout::new("alice", a5, Orientation::Portrait)).unwrap();
    layout.other_options.orientation = None;
    update_layout(&fx.conn, &layout).unwrap();

    let err = export_songbook(&fx.conn, &fx.config, book.id, layout.id).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<SongbookError>(),
        Some(SongbookError::MissingOrientation { .. })
    ));
    assert!(!fx.config.export_dir.exists());
}

#[test]
fn dangling_item_fails_description() {
    let fx = fixture();
    let book = create_songbook(&fx.conn, "Camp", "", false, "alice").unwrap();
    let gone = song(&fx, "Gone", None);
    add_song(&fx.conn, book.id, gone.id, None).unwrap();

    fx.conn
        .execute("DELETE FROM songs WHERE id = ?1", [gone.id])
        .unwrap();

    let err = describe_songbook(&fx.conn, book.id).unwrap_err();
    match err.downcast_ref::<SongbookError>() {
        Some(SongbookError::DanglingItem { kind, item_id, .. }) => {
            assert_eq!(*kind, ItemKind::Song);
            assert_eq!(*item_id, gone.id);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn deleting_a_song_clears_its_slots_and_file() {
    let fx = fixture();
    let book = create_songbook(&fx.conn, "Camp", "", false, "alice").unwrap();
    let doomed = song(&fx, "Doomed", None);
    add_song(&fx.conn, book.id, doomed.id, None).unwrap();
    let file = fx.library.absolute_path(&doomed.file_path);
    assert!(file.is_file());

    delete_song(&fx.conn, &fx.library, doomed.id).unwrap();
    assert!(fetch_slots(&fx.conn, book.id).unwrap().is_empty());
    assert!(!file.exists());
    assert!(describe_songbook(&fx.conn, book.id).unwrap().content.is_empty());
}
