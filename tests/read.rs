use assert_approx_eq::assert_approx_eq;
use phaeton::*;
use std::io::Write;
use tempfile::NamedTempFile;

static REQ_SCHEMA_V6: &str = "OsmSchema-V0.6";
static REQ_DENSE_NODES: &str = "DenseNodes";

// Helper functions to build extracts on the fly
fn header_only(encoding: BlobEncoding) -> BlobWriter<Vec<u8>> {
    let mut writer = BlobWriter::new(Vec::new());
    writer
        .write_header_block(&[REQ_SCHEMA_V6, REQ_DENSE_NODES], encoding)
        .unwrap();
    writer
}

/// First block of [`triangle`]: 3 points and 1 closed path around them.
fn triangle_shape<W: Write>(writer: BlobWriter<W>, encoding: BlobEncoding) -> BlobWriter<W> {
    let mut block = BlockBuilder::new(writer);
    block
        .add_point(105, 52_122_403_100, 11_628_401_700, &[])
        .add_point(
            106,
            52_119_923_500,
            11_625_644_600,
            &[Tag::new("amenity", "cafe")],
        )
        .add_point(108, 52_119_899_100, 11_631_019_200, &[])
        .add_path(
            107,
            &[105, 106, 108, 105],
            &[Tag::new("building", "yes"), Tag::new("name", "triangle")],
        );
    block.finish(encoding).unwrap()
}

/// The triangle plus 1 relation in a second block.
fn triangle(encoding: BlobEncoding) -> Vec<u8> {
    let mut block = BlockBuilder::new(triangle_shape(header_only(encoding), encoding));
    block.add_relation(
        200,
        &[Member {
            kind: PrimitiveKind::Path,
            id: 107,
            role: "test_role".to_string(),
        }],
        &[Tag::new("rel_key", "rel_value")],
    );
    block.finish(encoding).unwrap().into_inner()
}

fn to_file(bytes: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(bytes).unwrap();
    file.flush().unwrap();
    file
}

fn count_bytes(bytes: &[u8]) -> Result<Counts> {
    dispatch(
        PrimitiveDecoder::new(std::io::Cursor::new(bytes))?,
        CountingHandler::new(),
    )
}

static ENCODINGS: &[BlobEncoding] = &[BlobEncoding::Raw, BlobEncoding::Zlib { level: 6 }];

#[test]
fn read_primitives() {
    for &encoding in ENCODINGS {
        let file = to_file(&triangle(encoding));
        let decoder = PrimitiveDecoder::from_path(file.path()).unwrap();

        assert_eq!(decoder.header().required_features(), [REQ_SCHEMA_V6, REQ_DENSE_NODES]);
        assert!(decoder.header().optional_features().is_empty());

        let primitives = decoder.collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(primitives.len(), 5);

        let ids = primitives
            .iter()
            .map(|p| (p.kind(), p.id()))
            .collect::<Vec<_>>();
        assert_eq!(
            ids,
            [
                (PrimitiveKind::Point, 105),
                (PrimitiveKind::Point, 106),
                (PrimitiveKind::Point, 108),
                (PrimitiveKind::Path, 107),
                (PrimitiveKind::Relation, 200),
            ]
        );

        match &primitives[1] {
            Primitive::Point(point) => {
                assert_approx_eq!(point.lat(), 52.1199235);
                assert_approx_eq!(point.lon(), 11.6256446);
                assert_eq!(point.nano_lat, 52_119_923_500);
                assert_eq!(point.tags, [Tag::new("amenity", "cafe")]);
            }
            other => panic!("unexpected primitive {other:?}"),
        }

        match &primitives[3] {
            Primitive::Path(path) => {
                assert_eq!(path.refs, [105, 106, 108, 105]);
                assert!(path.is_closed());
                assert!(path.tags.contains(&Tag::new("name", "triangle")));
            }
            other => panic!("unexpected primitive {other:?}"),
        }

        match &primitives[4] {
            Primitive::Relation(relation) => {
                assert_eq!(relation.members.len(), 1);
                assert_eq!(relation.members[0].role, "test_role");
                assert_eq!(relation.members[0].kind, PrimitiveKind::Path);
                assert_eq!(relation.tags, [Tag::new("rel_key", "rel_value")]);
            }
            other => panic!("unexpected primitive {other:?}"),
        }
    }
}

#[test]
fn three_points_one_path() {
    let mut block = BlockBuilder::new(header_only(BlobEncoding::Raw));
    block
        .add_point(1, 0, 0, &[])
        .add_point(2, 100, 100, &[])
        .add_point(3, 200, 200, &[])
        .add_path(4, &[1, 2, 3], &[]);
    let file = to_file(&block.finish(BlobEncoding::Raw).unwrap().into_inner());

    let config = RunConfig::new(file.path(), None).unwrap();
    let counts = run(&config, CountingHandler::new()).unwrap();
    assert_eq!(
        counts,
        Counts {
            points: 3,
            paths: 1,
            relations: 0
        }
    );
}

#[test]
fn counts_do_not_depend_on_interleaving() {
    let members = [Member {
        kind: PrimitiveKind::Point,
        id: 1,
        role: String::new(),
    }];

    let mut grouped = BlockBuilder::new(header_only(BlobEncoding::Raw));
    grouped
        .add_point(1, 0, 0, &[])
        .add_point(2, 0, 0, &[])
        .add_point(3, 0, 0, &[])
        .add_path(10, &[1, 2], &[])
        .add_path(11, &[2, 3], &[])
        .add_relation(20, &members, &[]);
    let grouped = grouped.finish(BlobEncoding::Raw).unwrap().into_inner();

    let mut writer = header_only(BlobEncoding::Zlib { level: 1 });
    for (i, id) in [1_u64, 2, 3].into_iter().enumerate() {
        let mut block = BlockBuilder::new(writer);
        if i == 1 {
            block.add_relation(20, &members, &[]);
        }
        block.add_point(id, 0, 0, &[]);
        if i < 2 {
            block.add_path(10 + i as u64, &[id, id + 1], &[]);
        }
        writer = block.finish(BlobEncoding::Zlib { level: 1 }).unwrap();
    }
    let interleaved = writer.into_inner();

    let expected = Counts {
        points: 3,
        paths: 2,
        relations: 1,
    };
    assert_eq!(count_bytes(&grouped).unwrap(), expected);
    assert_eq!(count_bytes(&interleaved).unwrap(), expected);
}

#[test]
fn empty_extract() {
    let file = to_file(&header_only(BlobEncoding::Raw).into_inner());
    let config = RunConfig::new(file.path(), None).unwrap();
    assert_eq!(
        run(&config, CountingHandler::new()).unwrap(),
        Counts::default()
    );

    // A block without groups contributes nothing either.
    let bytes = BlockBuilder::new(header_only(BlobEncoding::Raw))
        .finish(BlobEncoding::Raw)
        .unwrap()
        .into_inner();
    assert_eq!(count_bytes(&bytes).unwrap(), Counts::default());
}

#[test]
fn truncated_extract_fails_without_counts() {
    let header_len = header_only(BlobEncoding::Raw).into_inner().len();
    let bytes = triangle(BlobEncoding::Raw);

    // Every cut inside a blob after the header is malformed. The cut between the two data
    // blobs leaves a valid, shorter extract.
    let first_data_end = triangle_shape(header_only(BlobEncoding::Raw), BlobEncoding::Raw)
        .into_inner()
        .len();

    for cut in (header_len + 1)..bytes.len() {
        if cut == first_data_end {
            continue;
        }
        let err = count_bytes(&bytes[..cut]).unwrap_err();
        assert!(err.is_malformed(), "cut at {cut}: {err}");
    }
}

#[test]
fn truncated_header_is_malformed() {
    let bytes = triangle(BlobEncoding::Raw);
    let err = PrimitiveDecoder::new(&bytes[..10]).err().unwrap();
    assert!(err.is_malformed());
}

#[test]
fn missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.osm.pbf");

    let err = PrimitiveDecoder::from_path(&path).err().unwrap();
    assert!(err.is_not_found());
    assert_eq!(err.category(), "not found");

    let config = RunConfig::new(&path, Some(12)).unwrap();
    let err = run(&config, CountingHandler::new()).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::NotFound { .. }));

    // A directory is not a readable extract either.
    let err = PrimitiveDecoder::from_path(dir.path()).err().unwrap();
    assert!(err.is_not_found());
}

#[test]
fn exhausted_sequence_stays_exhausted() {
    let file = to_file(&triangle(BlobEncoding::Zlib { level: 6 }));
    let mut decoder = PrimitiveDecoder::from_path(file.path()).unwrap();
    assert!(decoder.is_open());

    assert_eq!(decoder.by_ref().count(), 5);
    assert!(!decoder.is_open());
    assert_eq!(decoder.blocks_decoded(), 2);

    for _ in 0..3 {
        assert!(decoder.next().is_none());
    }
}

#[test]
fn failed_sequence_stays_exhausted() {
    let mut writer = header_only(BlobEncoding::Raw);
    writer.write_custom_blob("OSMIndex", vec![1, 2, 3]).unwrap();
    let mut decoder = PrimitiveDecoder::new(std::io::Cursor::new(writer.into_inner())).unwrap();

    let err = decoder.next().unwrap().unwrap_err();
    assert!(matches!(
        err.kind(),
        ErrorKind::Malformed(MalformedInput::UnknownBlobType(name)) if name == "OSMIndex"
    ));
    assert!(!decoder.is_open());
    assert!(decoder.next().is_none());
}

#[test]
fn error_after_valid_block_discards_counts() {
    let mut block = BlockBuilder::new(header_only(BlobEncoding::Raw));
    block.add_point(1, 0, 0, &[]);
    let mut writer = block.finish(BlobEncoding::Raw).unwrap();
    writer
        .write_header_block(&[REQ_SCHEMA_V6], BlobEncoding::Raw)
        .unwrap();

    let err = count_bytes(&writer.into_inner()).unwrap_err();
    assert!(matches!(
        err.kind(),
        ErrorKind::Malformed(MalformedInput::UnexpectedHeaderBlock)
    ));
}

#[test]
fn extract_must_start_with_header() {
    let bytes = BlockBuilder::new(BlobWriter::new(Vec::new()))
        .finish(BlobEncoding::Raw)
        .unwrap()
        .into_inner();
    let err = PrimitiveDecoder::new(bytes.as_slice()).err().unwrap();
    assert!(matches!(
        err.kind(),
        ErrorKind::Malformed(MalformedInput::MissingHeaderBlock)
    ));

    let err = PrimitiveDecoder::new(std::io::empty()).err().unwrap();
    assert!(err.is_malformed());
}

#[test]
fn unsupported_required_feature() {
    let mut writer = BlobWriter::new(Vec::new());
    writer
        .write_header_block(&[REQ_SCHEMA_V6, "Sort.Type_then_ID"], BlobEncoding::Raw)
        .unwrap();

    let err = PrimitiveDecoder::new(writer.into_inner().as_slice())
        .err()
        .unwrap();
    assert!(err.is_unsupported());
    match err.into_kind() {
        ErrorKind::Unsupported(UnsupportedFormat::RequiredFeature(feature)) => {
            assert_eq!(feature, "Sort.Type_then_ID")
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn handlers_do_not_share_state() {
    #[derive(Default)]
    struct TagKeys(Vec<String>);

    impl Handler for TagKeys {
        type Output = Vec<String>;

        fn on_point(&mut self, point: &Point) -> HandlerResult {
            self.0.extend(point.tags.iter().map(|t| t.key.clone()));
            Ok(())
        }

        fn on_path(&mut self, path: &Path) -> HandlerResult {
            self.0.extend(path.tags.iter().map(|t| t.key.clone()));
            Ok(())
        }

        fn finish(self) -> Vec<String> {
            self.0
        }
    }

    let file = to_file(&triangle(BlobEncoding::Raw));
    let config = RunConfig::new(file.path(), None).unwrap();

    let first = run(&config, CountingHandler::new()).unwrap();
    let keys = run(&config, TagKeys::default()).unwrap();
    let second = run(&config, CountingHandler::new()).unwrap();

    assert_eq!(keys, ["amenity", "building", "name"]);
    assert_eq!(first, second);
    assert_eq!(
        first,
        Counts {
            points: 3,
            paths: 1,
            relations: 1
        }
    );
}

#[test]
fn failing_handler_aborts_run() {
    struct StopAtRelation;

    impl Handler for StopAtRelation {
        type Output = ();

        fn on_relation(&mut self, relation: &Relation) -> HandlerResult {
            Err(format!("relation {} not allowed", relation.id).into())
        }

        fn finish(self) {}
    }

    let file = to_file(&triangle(BlobEncoding::Raw));
    let config = RunConfig::new(file.path(), None).unwrap();
    let err = run(&config, StopAtRelation).unwrap_err();
    assert!(err.is_dispatch());
    assert_eq!(err.to_string(), "handler failed on relation 200: relation 200 not allowed");
}

#[test]
fn zoom_does_not_change_counts() {
    let file = to_file(&triangle(BlobEncoding::Raw));

    let plain = RunConfig::new(file.path(), None).unwrap();
    let zoomed = RunConfig::new(file.path(), Some(12)).unwrap();
    assert_eq!(zoomed.zoom(), Some(12));

    assert_eq!(
        run(&plain, CountingHandler::new()).unwrap(),
        run(&zoomed, CountingHandler::new()).unwrap()
    );
}

#[test]
fn road_graph_keeps_highways() {
    let mut block = BlockBuilder::new(header_only(BlobEncoding::Raw));
    block
        .add_point(1, 52_000_000_000, 13_000_000_000, &[])
        .add_point(2, 52_000_100_000, 13_000_000_000, &[])
        .add_point(3, 52_000_100_000, 13_000_100_000, &[])
        .add_point(4, 52_000_000_000, 13_000_100_000, &[])
        .add_point(5, 52_000_500_000, 13_000_500_000, &[])
        .add_path(
            10,
            &[1, 2, 3],
            &[Tag::new("highway", "residential"), Tag::new("name", "Hauptstraße")],
        )
        .add_path(
            11,
            &[1, 2, 3, 4, 1],
            &[Tag::new("building", "yes")],
        )
        .add_path(12, &[3, 4, 99], &[Tag::new("highway", "service")]);
    let writer = block.finish(BlobEncoding::Zlib { level: 6 }).unwrap();
    let mut block = BlockBuilder::new(writer);
    block.add_relation(
        20,
        &[Member {
            kind: PrimitiveKind::Path,
            id: 10,
            role: String::new(),
        }],
        &[Tag::new("type", "route")],
    );
    let file = to_file(&block.finish(BlobEncoding::Raw).unwrap().into_inner());

    let config = RunConfig::new(file.path(), None).unwrap();
    let graph = build_graph(&config).unwrap();

    assert_eq!(
        graph.edges.iter().map(|e| e.id).collect::<Vec<_>>(),
        [10, 12]
    );
    assert_eq!(graph.edges[1].vertices, [3, 4, 99]);
    assert_eq!(graph.metadata[&10][1], Tag::new("name", "Hauptstraße"));
    assert!(!graph.metadata.contains_key(&11));

    let mut ids = graph.vertices.keys().copied().collect::<Vec<_>>();
    ids.sort_unstable();
    assert_eq!(ids, [1, 2, 3, 4]);
    assert_approx_eq!(graph.vertices[&3].lat, 52.0001);
    assert_approx_eq!(graph.vertices[&3].lon, 13.0001);
    assert_eq!(graph.missing_vertices().into_iter().collect::<Vec<_>>(), [99]);
}

#[test]
fn road_graph_of_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = RunConfig::new(dir.path().join("missing.osm.pbf"), None).unwrap();
    assert!(build_graph(&config).unwrap_err().is_not_found());
}
