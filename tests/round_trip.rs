//! Write-reopen-assert coverage of the generic object/property API.

use abcio::abc::{IArchive, OArchive};
use abcio::core::{MetaData, PropertyHeader, SampleSelector, TimeSampling};
use abcio::util::{DataType, Error};

use tempfile::NamedTempFile;

#[test]
fn hierarchy_round_trip() {
    let temp = NamedTempFile::new().unwrap();

    {
        let archive = OArchive::create(temp.path()).unwrap();
        let top = archive.top();
        top.create_child("first").unwrap();
        top.create_child("second").unwrap();
        let group = top.create_child("group").unwrap();
        group.create_child("nested").unwrap();
        archive.close().unwrap();
    }

    let archive = IArchive::open(temp.path()).unwrap();
    let top = archive.top();
    assert!(top.is_root());
    assert_eq!(top.name(), "ABC");
    assert_eq!(top.num_children(), 3);

    // creation order is preserved
    let names: Vec<String> = top.children().map(|c| c.name().to_string()).collect();
    assert_eq!(names, ["first", "second", "group"]);

    let group = top.child_by_name("group").unwrap();
    assert_eq!(group.full_name(), "/group");
    assert_eq!(group.num_children(), 1);

    let nested = group.child(0).unwrap();
    assert_eq!(nested.full_name(), "/group/nested");

    // upward navigation reaches the root
    let parent = nested.parent().unwrap();
    assert_eq!(parent.name(), "group");
    assert!(parent.parent().unwrap().is_root());

    // path lookup
    assert!(archive.find("/group/nested").is_some());
    assert!(archive.find("/group/missing").is_none());
}

#[test]
fn property_values_round_trip() {
    let temp = NamedTempFile::new().unwrap();

    {
        let archive = OArchive::create(temp.path()).unwrap();
        let obj = archive.top().create_child("values").unwrap();
        let props = obj.properties();

        let mass = props.create_scalar("mass", DataType::FLOAT64).unwrap();
        mass.add_typed(&2.5f64).unwrap();
        mass.add_typed(&3.5f64).unwrap();

        let label = props.create_scalar("label", DataType::STRING).unwrap();
        label.add_string("hello archive").unwrap();

        let counts = props.create_array("counts", DataType::INT32).unwrap();
        counts.add_typed(&[4i32, 5, 6, 7]).unwrap();
        counts.add_typed(&[8i32]).unwrap();

        let nested = props.create_compound("nested").unwrap();
        let flag = nested.create_scalar("flag", DataType::BOOL).unwrap();
        flag.add_sample(&[1]).unwrap();

        archive.close().unwrap();
    }

    let archive = IArchive::open(temp.path()).unwrap();
    let props = archive.find("/values").unwrap().properties().unwrap();
    assert_eq!(props.num_properties(), 4);
    assert_eq!(props.property_names(), ["mass", "label", "counts", "nested"]);

    let mass = props.scalar_by_name("mass").unwrap();
    assert_eq!(mass.num_samples(), 2);
    assert!(!mass.is_constant());
    assert_eq!(mass.get_typed::<f64>(0usize).unwrap(), 2.5);
    assert_eq!(mass.get_typed::<f64>(1usize).unwrap(), 3.5);

    let label = props.scalar_by_name("label").unwrap();
    assert_eq!(label.get_string(0usize).unwrap(), "hello archive");

    let counts = props.array_by_name("counts").unwrap();
    assert_eq!(counts.num_samples(), 2);
    assert_eq!(counts.sample_len(0usize).unwrap(), 4);
    assert_eq!(counts.get_typed::<i32>(0usize).unwrap(), [4, 5, 6, 7]);
    assert_eq!(counts.get_typed::<i32>(1usize).unwrap(), [8]);

    let nested = props.compound_by_name("nested").unwrap();
    let flag = nested.scalar_by_name("flag").unwrap();
    assert_eq!(flag.sample_bytes(0usize).unwrap(), [1]);

    // upward navigation: property -> compound -> top compound -> object
    assert_eq!(flag.object().full_name(), "/values");
    let owner = flag.parent().unwrap();
    assert_eq!(owner.header().name, "nested");
    let top_compound = owner.parent().unwrap();
    assert!(top_compound.parent().is_none());
    assert_eq!(top_compound.object().name(), "values");
}

#[test]
fn compound_with_uint32_array_scenario() {
    let temp = NamedTempFile::new().unwrap();

    {
        let archive = OArchive::create(temp.path()).unwrap();
        let obj = archive.top().create_child("holder").unwrap();
        let compound = obj.properties().create_compound("params").unwrap();
        let values = compound.create_array("ids", DataType::UINT32).unwrap();
        values.add_typed(&[1u32, 2, 3]).unwrap();
        archive.close().unwrap();
    }

    let archive = IArchive::open(temp.path()).unwrap();
    let compound = archive
        .find("/holder")
        .unwrap()
        .properties()
        .unwrap()
        .compound_by_name("params")
        .unwrap();
    let values = compound.array_by_name("ids").unwrap();
    assert_eq!(values.get_typed::<u32>(0usize).unwrap(), [1, 2, 3]);
    assert_eq!(values.sample_len(0usize).unwrap(), 3);
    assert_eq!(values.dimensions(0usize).unwrap(), [3]);
}

#[test]
fn metadata_round_trip() {
    let temp = NamedTempFile::new().unwrap();

    {
        let archive = OArchive::create(temp.path()).unwrap();
        let mut meta = MetaData::new();
        meta.set_schema("Custom_Thing_v2");
        meta.set("hint", "up=y");
        archive.top().create_child_with("thing", meta).unwrap();

        let obj = archive.top().create_child("plain").unwrap();
        let mut prop_meta = MetaData::new();
        prop_meta.set(MetaData::INTERPRETATION_KEY, "vector");
        obj.properties()
            .create_array_with(
                PropertyHeader::array("v", DataType::VEC3F).with_meta_data(prop_meta),
            )
            .unwrap()
            .add_typed(&[1.0f32, 2.0, 3.0])
            .unwrap();

        archive.close().unwrap();
    }

    let archive = IArchive::open(temp.path()).unwrap();
    let thing = archive.find("/thing").unwrap();
    assert!(thing.matches_schema("Custom_Thing_v2"));
    assert!(!thing.matches_schema("Custom_Thing_v1"));
    assert_eq!(thing.meta_data().get("hint"), Some("up=y"));

    let v = archive
        .find("/plain")
        .unwrap()
        .properties()
        .unwrap()
        .array_by_name("v")
        .unwrap();
    assert_eq!(v.header().meta_data.interpretation(), Some("vector"));
    assert_eq!(v.header().data_type, DataType::VEC3F);
}

#[test]
fn duplicate_names_rejected_and_first_kept() {
    let temp = NamedTempFile::new().unwrap();
    let archive = OArchive::create(temp.path()).unwrap();
    let top = archive.top();

    let child = top.create_child("twin").unwrap();
    let err = top.create_child("twin").unwrap_err();
    assert!(matches!(err, Error::DuplicateName { .. }));
    // the first child stays usable
    child.create_child("grandchild").unwrap();
    assert_eq!(top.num_children().unwrap(), 1);

    let props = child.properties();
    props.create_scalar("p", DataType::FLOAT32).unwrap();
    let err = props.create_array("p", DataType::UINT32).unwrap_err();
    assert!(matches!(err, Error::DuplicateName { .. }));
    assert_eq!(props.num_properties().unwrap(), 1);
}

#[test]
fn sample_type_mismatch_rejected() {
    let temp = NamedTempFile::new().unwrap();
    let archive = OArchive::create(temp.path()).unwrap();
    let props = archive.top().create_child("o").unwrap().properties();

    let scalar = props.create_scalar("s", DataType::FLOAT32).unwrap();
    scalar.add_typed(&1.0f32).unwrap();
    assert!(matches!(
        scalar.add_typed(&1.0f64),
        Err(Error::TypeMismatch { .. })
    ));
    assert!(matches!(
        scalar.add_pod(&7u32),
        Err(Error::TypeMismatch { .. })
    ));
    assert_eq!(scalar.num_samples().unwrap(), 1);

    let array = props.create_array("a", DataType::UINT32).unwrap();
    assert!(matches!(
        array.add_typed(&[1.0f32]),
        Err(Error::TypeMismatch { .. })
    ));
    // odd byte count for the element size
    assert!(matches!(
        array.add_sample(&[0, 1, 2], None),
        Err(Error::TypeMismatch { .. })
    ));
    assert_eq!(array.num_samples().unwrap(), 0);
}

#[test]
fn sample_index_bounds_checked() {
    let temp = NamedTempFile::new().unwrap();

    {
        let archive = OArchive::create(temp.path()).unwrap();
        let props = archive.top().create_child("o").unwrap().properties();
        let s = props.create_scalar("s", DataType::UINT8).unwrap();
        s.add_sample(&[7]).unwrap();
        let a = props.create_array("a", DataType::UINT8).unwrap();
        a.add_typed(&[1u8, 2]).unwrap();
        archive.close().unwrap();
    }

    let archive = IArchive::open(temp.path()).unwrap();
    let props = archive.find("/o").unwrap().properties().unwrap();

    let s = props.scalar_by_name("s").unwrap();
    assert_eq!(s.sample_bytes(0usize).unwrap(), [7]);
    assert!(matches!(
        s.sample_bytes(1usize),
        Err(Error::IndexOutOfRange { index: 1, count: 1 })
    ));

    let a = props.array_by_name("a").unwrap();
    assert!(matches!(
        a.sample_bytes(5usize),
        Err(Error::IndexOutOfRange { index: 5, count: 1 })
    ));

    let obj = archive.find("/o").unwrap();
    assert!(matches!(
        obj.child(0),
        Err(Error::IndexOutOfRange { .. })
    ));
}

#[test]
fn constant_properties_collapse() {
    let temp_constant = NamedTempFile::new().unwrap();
    let temp_varying = NamedTempFile::new().unwrap();
    let payload: Vec<u32> = (0..256).collect();

    {
        let archive = OArchive::create(temp_constant.path()).unwrap();
        let props = archive.top().create_child("o").unwrap().properties();
        let a = props.create_array("a", DataType::UINT32).unwrap();
        let s = props.create_scalar("s", DataType::FLOAT64).unwrap();
        for _ in 0..100 {
            a.add_typed(&payload).unwrap();
            s.add_typed(&1.25f64).unwrap();
        }
        archive.close().unwrap();
    }
    {
        let archive = OArchive::create(temp_varying.path()).unwrap();
        let props = archive.top().create_child("o").unwrap().properties();
        let a = props.create_array("a", DataType::UINT32).unwrap();
        let s = props.create_scalar("s", DataType::FLOAT64).unwrap();
        for i in 0..100u32 {
            let mut varied = payload.clone();
            varied[0] = i;
            a.add_typed(&varied).unwrap();
            s.add_typed(&(i as f64)).unwrap();
        }
        archive.close().unwrap();
    }

    let archive = IArchive::open(temp_constant.path()).unwrap();
    let props = archive.find("/o").unwrap().properties().unwrap();

    let a = props.array_by_name("a").unwrap();
    assert_eq!(a.num_samples(), 100);
    assert!(a.is_constant());
    assert_eq!(a.get_typed::<u32>(99usize).unwrap(), payload);
    // every index reports the same stored key
    assert_eq!(
        a.sample_key(0usize).unwrap(),
        a.sample_key(99usize).unwrap()
    );

    let s = props.scalar_by_name("s").unwrap();
    assert!(s.is_constant());
    assert_eq!(s.get_typed::<f64>(42usize).unwrap(), 1.25);

    // the constant archive must not pay per-sample storage for the payload
    let constant_size = std::fs::metadata(temp_constant.path()).unwrap().len();
    let varying_size = std::fs::metadata(temp_varying.path()).unwrap().len();
    assert!(
        constant_size * 10 < varying_size,
        "constant {constant_size} vs varying {varying_size}"
    );
}

#[test]
fn non_adjacent_duplicates_do_not_collapse() {
    let temp = NamedTempFile::new().unwrap();

    {
        let archive = OArchive::create(temp.path()).unwrap();
        let props = archive.top().create_child("o").unwrap().properties();
        let a = props.create_array("a", DataType::UINT32).unwrap();
        a.add_typed(&[1u32, 2, 3]).unwrap();
        a.add_typed(&[9u32, 9, 9]).unwrap();
        a.add_typed(&[1u32, 2, 3]).unwrap();
        archive.close().unwrap();
    }

    let archive = IArchive::open(temp.path()).unwrap();
    let a = archive
        .find("/o")
        .unwrap()
        .properties()
        .unwrap()
        .array_by_name("a")
        .unwrap();
    assert!(!a.is_constant());
    assert_eq!(a.get_typed::<u32>(1usize).unwrap(), [9, 9, 9]);
    assert_eq!(a.get_typed::<u32>(2usize).unwrap(), [1, 2, 3]);
    // identical content still shares one stored key
    assert_eq!(a.sample_key(0usize).unwrap(), a.sample_key(2usize).unwrap());
}

#[test]
fn closed_archive_rejects_operations() {
    let temp = NamedTempFile::new().unwrap();
    let archive = OArchive::create(temp.path()).unwrap();
    let top = archive.top();
    let obj = top.create_child("o").unwrap();
    let props = obj.properties();
    let prop = props.create_scalar("p", DataType::FLOAT32).unwrap();
    prop.add_typed(&1.0f32).unwrap();

    archive.close().unwrap();

    assert!(matches!(
        top.create_child("late"),
        Err(Error::InvalidState(_))
    ));
    assert!(matches!(
        props.create_scalar("late", DataType::FLOAT32),
        Err(Error::InvalidState(_))
    ));
    assert!(matches!(
        prop.add_typed(&2.0f32),
        Err(Error::InvalidState(_))
    ));

    // the file is sealed and readable despite the failed late writes
    let archive = IArchive::open(temp.path()).unwrap();
    assert_eq!(archive.top().num_children(), 1);
}

#[test]
fn time_selectors_resolve_against_sampling() {
    let temp = NamedTempFile::new().unwrap();

    {
        let archive = OArchive::create(temp.path()).unwrap();
        let ts = archive
            .add_time_sampling(TimeSampling::uniform(0.5, 1.0))
            .unwrap();
        let props = archive.top().create_child("o").unwrap().properties();
        let s = props
            .create_scalar_with(
                PropertyHeader::scalar("s", DataType::UINT32).with_time_sampling(ts),
            )
            .unwrap();
        for i in 0..4u32 {
            s.add_typed(&i).unwrap();
        }
        archive.close().unwrap();
    }

    let archive = IArchive::open(temp.path()).unwrap();
    let s = archive
        .find("/o")
        .unwrap()
        .properties()
        .unwrap()
        .scalar_by_name("s")
        .unwrap();

    // samples at t = 1.0, 1.5, 2.0, 2.5
    assert_eq!(
        s.get_typed::<u32>(SampleSelector::TimeFloor(1.6)).unwrap(),
        1
    );
    assert_eq!(
        s.get_typed::<u32>(SampleSelector::TimeCeil(1.6)).unwrap(),
        2
    );
    assert_eq!(
        s.get_typed::<u32>(SampleSelector::TimeNear(2.4)).unwrap(),
        3
    );
    // far outside the sampled range clamps to the ends
    assert_eq!(
        s.get_typed::<u32>(SampleSelector::TimeFloor(-10.0)).unwrap(),
        0
    );
    assert_eq!(
        s.get_typed::<u32>(SampleSelector::TimeCeil(99.0)).unwrap(),
        3
    );
}
