//! Archive-level behavior: detection, stamps, time ranges, concurrency.

use std::io::Write;
use std::sync::Arc;
use std::thread;

use abcio::abc::{IArchive, OArchive, WriteOptions};
use abcio::core::TimeSampling;
use abcio::util::{DataType, Error};
use abcio::ArchiveKind;

use tempfile::NamedTempFile;

#[test]
fn open_auto_detects_container() {
    let temp = NamedTempFile::new().unwrap();
    {
        let archive = OArchive::create(temp.path()).unwrap();
        archive.top().create_child("x").unwrap();
        archive.close().unwrap();
    }

    assert_eq!(abcio::factory::detect(temp.path()).unwrap(), ArchiveKind::Ogawa);

    let archive = IArchive::open(temp.path()).unwrap();
    assert_eq!(archive.kind(), ArchiveKind::Ogawa);
    assert_eq!(archive.top().num_children(), 1);

    // explicit kind works the same
    let archive = IArchive::open_kind(temp.path(), ArchiveKind::Ogawa).unwrap();
    assert_eq!(archive.top().num_children(), 1);
}

#[test]
fn garbage_fails_as_invalid_archive() {
    let mut temp = NamedTempFile::new().unwrap();
    temp.write_all(b"these are not the bytes you are looking for")
        .unwrap();
    assert!(matches!(
        IArchive::open(temp.path()),
        Err(Error::InvalidArchive(_))
    ));

    assert!(matches!(
        IArchive::open("/nonexistent/path.abc"),
        Err(Error::InvalidArchive(_))
    ));
}

#[test]
fn truncated_archive_fails_as_invalid() {
    let temp = NamedTempFile::new().unwrap();
    {
        let archive = OArchive::create(temp.path()).unwrap();
        archive.top().create_child("x").unwrap();
        archive.close().unwrap();
    }
    let bytes = std::fs::read(temp.path()).unwrap();

    // magic survives but the tail (catalogue and root group) is gone
    let mut cut = NamedTempFile::new().unwrap();
    cut.write_all(&bytes[..24]).unwrap();
    assert!(IArchive::open(cut.path()).is_err());
}

#[test]
fn archive_stamps_round_trip() {
    let temp = NamedTempFile::new().unwrap();
    {
        let archive = OArchive::create_kind(
            temp.path(),
            ArchiveKind::Ogawa,
            WriteOptions {
                app_name: Some("exporter 2.1".into()),
                user_description: Some("unit fixture".into()),
            },
        )
        .unwrap();
        archive.top().create_child("x").unwrap();
        archive.close().unwrap();
    }

    let archive = IArchive::open(temp.path()).unwrap();
    assert_eq!(archive.app_name(), Some("exporter 2.1"));
    assert_eq!(archive.user_description(), Some("unit fixture"));
    assert!(archive.date_written().is_some());
}

#[test]
fn time_sampling_table_round_trip() {
    let temp = NamedTempFile::new().unwrap();
    {
        let archive = OArchive::create(temp.path()).unwrap();
        let uniform = archive
            .add_time_sampling(TimeSampling::uniform(1.0 / 24.0, 0.5))
            .unwrap();
        let acyclic = archive
            .add_time_sampling(TimeSampling::acyclic(vec![0.0, 0.3, 1.7]))
            .unwrap();
        assert_eq!((uniform, acyclic), (1, 2));
        // equivalent sampling dedups to the same slot
        assert_eq!(
            archive
                .add_time_sampling(TimeSampling::uniform(1.0 / 24.0, 0.5))
                .unwrap(),
            1
        );
        archive.top().create_child("x").unwrap();
        archive.close().unwrap();
    }

    let archive = IArchive::open(temp.path()).unwrap();
    assert_eq!(archive.num_time_samplings(), 3);
    let uniform = archive.time_sampling(1).unwrap();
    assert!(uniform.is_equivalent(&TimeSampling::uniform(1.0 / 24.0, 0.5)));
    let acyclic = archive.time_sampling(2).unwrap();
    assert_eq!(acyclic.time_at(2, 3).unwrap(), 1.7);
}

#[test]
fn time_range_from_summary_and_walk() {
    let temp = NamedTempFile::new().unwrap();
    {
        let archive = OArchive::create(temp.path()).unwrap();
        let ts = archive
            .add_time_sampling(TimeSampling::uniform(0.25, 1.0))
            .unwrap();
        let props = archive.top().create_child("o").unwrap().properties();
        let p = props
            .create_scalar_with(
                abcio::core::PropertyHeader::scalar("v", DataType::FLOAT32)
                    .with_time_sampling(ts),
            )
            .unwrap();
        for i in 0..9u32 {
            p.add_typed(&(i as f32)).unwrap();
        }
        archive.close().unwrap();
    }

    let archive = IArchive::open(temp.path()).unwrap();

    // samples span t = 1.0 .. 1.0 + 8 * 0.25
    assert_eq!(archive.max_num_samples(1), Some(9));
    let (start, end) = archive.time_range().unwrap();
    assert_eq!((start, end), (1.0, 3.0));

    // the tree-walk fallback agrees with the summary
    assert_eq!(archive.time_range_walk().unwrap(), (1.0, 3.0));
}

#[test]
fn static_archive_has_no_time_range() {
    let temp = NamedTempFile::new().unwrap();
    {
        let archive = OArchive::create(temp.path()).unwrap();
        let props = archive.top().create_child("o").unwrap().properties();
        let p = props.create_scalar("v", DataType::UINT8).unwrap();
        p.add_sample(&[1]).unwrap();
        archive.close().unwrap();
    }

    let archive = IArchive::open(temp.path()).unwrap();
    assert_eq!(archive.time_range(), None);
}

#[test]
fn concurrent_readers_share_one_archive() {
    let temp = NamedTempFile::new().unwrap();
    let payload: Vec<u32> = (0..1024).collect();

    {
        let archive = OArchive::create(temp.path()).unwrap();
        for o in 0..4 {
            let obj = archive.top().create_child(&format!("obj{o}")).unwrap();
            let a = obj.properties().create_array("data", DataType::UINT32).unwrap();
            for i in 0..16u32 {
                let mut varied = payload.clone();
                varied[0] = o as u32 * 1000 + i;
                a.add_typed(&varied).unwrap();
            }
        }
        archive.close().unwrap();
    }

    let archive = Arc::new(IArchive::open(temp.path()).unwrap());
    let mut workers = Vec::new();
    for o in 0..4usize {
        let archive = archive.clone();
        let payload = payload.clone();
        workers.push(thread::spawn(move || {
            let a = archive
                .find(&format!("/obj{o}"))
                .unwrap()
                .properties()
                .unwrap()
                .array_by_name("data")
                .unwrap();
            for i in 0..16usize {
                let sample = a.get_typed::<u32>(i).unwrap();
                assert_eq!(sample[0], o as u32 * 1000 + i as u32);
                assert_eq!(&sample[1..], &payload[1..]);
            }
        }));
    }
    for w in workers {
        w.join().unwrap();
    }
}

#[test]
fn drop_without_close_still_seals() {
    let temp = NamedTempFile::new().unwrap();
    {
        let archive = OArchive::create(temp.path()).unwrap();
        archive.top().create_child("committed-on-drop").unwrap();
        // no close()
    }

    let archive = IArchive::open(temp.path()).unwrap();
    assert!(archive.find("/committed-on-drop").is_some());
}
