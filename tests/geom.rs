//! Schema-level round trips: transforms, meshes, geometry parameters.

use abcio::abc::{IArchive, OArchive};
use abcio::core::{GeometryScope, TimeSampling};
use abcio::geom::{
    IGeomParam, IPolyMesh, IXform, OGeomParam, OPolyMesh, OXform, PolyMeshSample, XformOp,
    XformSample,
};
use abcio::util::{DataType, Error};

use glam::{DVec3, Vec3};
use tempfile::NamedTempFile;

#[test]
fn animated_translate_round_trip() {
    let temp = NamedTempFile::new().unwrap();

    {
        let archive = OArchive::create(temp.path()).unwrap();
        let ts = archive
            .add_time_sampling(TimeSampling::uniform(1.0 / 24.0, 0.0))
            .unwrap();

        let mut xform = OXform::new("a").with_time_sampling(ts);
        for i in 0..20 {
            let mut sample = XformSample::identity();
            sample.push(XformOp::translate(12.0, 42.0 + i as f64, 20.0));
            xform.add_sample(sample);
        }
        xform.attach(&archive.top()).unwrap();
        archive.close().unwrap();
    }

    let archive = IArchive::open(temp.path()).unwrap();
    let obj = archive.find("/a").unwrap();
    let xform = IXform::new(&obj).unwrap();

    assert_eq!(xform.num_ops(), 1);
    assert_eq!(xform.num_samples(), 20);
    assert!(!xform.is_constant());
    assert!(xform.inherits());

    for i in 0..20 {
        let sample = xform.sample(i).unwrap();
        assert_eq!(sample.ops.len(), 1);
        let op = &sample.ops[0];
        assert!(op.is_y_animated(), "sample {i}");
        assert!(!op.is_x_animated(), "sample {i}");
        assert!(!op.is_z_animated(), "sample {i}");
        assert_eq!(
            sample.translation(),
            DVec3::new(12.0, 42.0 + i as f64, 20.0)
        );
    }
}

#[test]
fn static_xform_is_constant() {
    let temp = NamedTempFile::new().unwrap();

    {
        let archive = OArchive::create(temp.path()).unwrap();
        let mut xform = OXform::new("still");
        for _ in 0..5 {
            let mut sample = XformSample::identity();
            sample.push(XformOp::scale(2.0, 2.0, 2.0));
            xform.add_sample(sample);
        }
        xform.attach(&archive.top()).unwrap();
        archive.close().unwrap();
    }

    let archive = IArchive::open(temp.path()).unwrap();
    let xform = IXform::new(&archive.find("/still").unwrap()).unwrap();
    assert!(xform.is_constant());
    let sample = xform.sample(4).unwrap();
    assert!(!sample.ops[0].is_x_animated());
    assert_eq!(sample.ops[0].values, [2.0, 2.0, 2.0]);
}

#[test]
fn mismatched_op_stacks_rejected() {
    let temp = NamedTempFile::new().unwrap();
    let archive = OArchive::create(temp.path()).unwrap();

    let mut xform = OXform::new("bad");
    let mut a = XformSample::identity();
    a.push(XformOp::translate(1.0, 0.0, 0.0));
    xform.add_sample(a);
    let mut b = XformSample::identity();
    b.push(XformOp::scale(1.0, 1.0, 1.0));
    xform.add_sample(b);

    assert!(matches!(
        xform.attach(&archive.top()),
        Err(Error::TypeMismatch { .. })
    ));
}

#[test]
fn schema_mismatch_on_wrong_wrapper() {
    let temp = NamedTempFile::new().unwrap();

    {
        let archive = OArchive::create(temp.path()).unwrap();
        let mut mesh = OPolyMesh::new("mesh");
        mesh.add_sample(PolyMeshSample::new(
            vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            vec![3],
            vec![0, 1, 2],
        ));
        mesh.attach(&archive.top()).unwrap();
        archive.top().create_child("untyped").unwrap();
        archive.close().unwrap();
    }

    let archive = IArchive::open(temp.path()).unwrap();
    let mesh_obj = archive.find("/mesh").unwrap();

    // the wrong typed wrapper reports what it found
    match IXform::new(&mesh_obj).err() {
        Some(Error::SchemaMismatch { expected, actual }) => {
            assert_eq!(expected, abcio::geom::XFORM_SCHEMA);
            assert_eq!(actual, abcio::geom::POLYMESH_SCHEMA);
        }
        other => panic!("expected SchemaMismatch, got {other:?}"),
    }
    assert!(IXform::new(&archive.find("/untyped").unwrap()).is_err());

    // the matching wrapper reads the same data generic access sees
    let mesh = IPolyMesh::new(&mesh_obj).unwrap();
    let sample = mesh.sample(0).unwrap();
    assert_eq!(sample.num_vertices(), 3);

    let generic = mesh_obj
        .properties()
        .unwrap()
        .compound_by_name(".geom")
        .unwrap()
        .array_by_name("P")
        .unwrap()
        .get_typed::<f32>(0usize)
        .unwrap();
    let flat: Vec<f32> = sample
        .positions
        .iter()
        .flat_map(|p| [p.x, p.y, p.z])
        .collect();
    assert_eq!(generic, flat);
}

#[test]
fn polymesh_round_trip_with_uvs() {
    let temp = NamedTempFile::new().unwrap();
    let positions = vec![
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::new(1.0, 0.0, 0.0),
        Vec3::new(0.5, 1.0, 0.0),
    ];

    {
        let archive = OArchive::create(temp.path()).unwrap();
        let mut mesh = OPolyMesh::new("tri");
        mesh.add_sample(
            PolyMeshSample::new(positions.clone(), vec![3], vec![0, 1, 2])
                .with_uvs(vec![[0.0, 0.0], [1.0, 0.0], [0.5, 1.0]]),
        );
        mesh.attach(&archive.top()).unwrap();
        archive.close().unwrap();
    }

    let archive = IArchive::open(temp.path()).unwrap();
    let obj = archive.find("/tri").unwrap();
    assert!(IPolyMesh::matches(obj.meta_data()));

    let mesh = IPolyMesh::new(&obj).unwrap();
    assert_eq!(mesh.num_samples(), 1);

    let sample = mesh.sample(0).unwrap();
    assert_eq!(sample.positions, positions);
    assert_eq!(sample.face_counts, [3]);
    assert_eq!(sample.face_indices, [0, 1, 2]);
    assert_eq!(
        sample.uvs.as_deref().unwrap(),
        [[0.0, 0.0], [1.0, 0.0], [0.5, 1.0]]
    );

    let bounds = mesh.bounds(0).unwrap();
    assert_eq!(bounds, [0.0, 0.0, 0.0, 1.0, 1.0, 0.0]);
}

#[test]
fn indexed_geom_param_round_trip() {
    let temp = NamedTempFile::new().unwrap();

    {
        let archive = OArchive::create(temp.path()).unwrap();
        let props = archive.top().create_child("o").unwrap().properties();
        let holder = props.create_compound(".geom").unwrap();

        let mut param = OGeomParam::new("color", DataType::VEC3F, GeometryScope::FaceVarying);
        let values: Vec<u8> = bytemuck::cast_slice(&[1.0f32, 0.0, 0.0, 0.0, 1.0, 0.0]).to_vec();
        param.add_indexed_sample(values, vec![0, 1, 1, 0]);
        param.attach(&holder).unwrap();

        archive.close().unwrap();
    }

    let archive = IArchive::open(temp.path()).unwrap();
    let holder = archive
        .find("/o")
        .unwrap()
        .properties()
        .unwrap()
        .compound_by_name(".geom")
        .unwrap();

    let param = IGeomParam::new(&holder, "color").unwrap();
    assert!(param.is_indexed());
    assert_eq!(param.scope(), GeometryScope::FaceVarying);
    assert_eq!(param.data_type(), DataType::VEC3F);

    let sample = param.sample(0).unwrap();
    assert_eq!(sample.num_values(), 2);
    assert_eq!(sample.num_elements(), 4);
    assert_eq!(
        sample.expand_f32(3),
        [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 0.0]
    );
}
