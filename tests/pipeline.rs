use std::fs::{self, File};
use std::io::{Read, Write};
use std::net::TcpListener;
use std::path::Path;
use std::sync::Arc;
use std::thread;

use diffusiondb::{
    Assembler, Catalog, CatalogOptions, DatasetError, Example, ExampleKind, HttpFetcher,
    LocalFetcher, Sampler, ShardId, ShardLocator, StreamState, TextExample,
};
use parquet::data_type::{ByteArray, ByteArrayType, FloatType, Int64Type};
use parquet::file::properties::WriterProperties;
use parquet::file::writer::SerializedFileWriter;
use parquet::schema::parser::parse_message_type;
use zip::write::SimpleFileOptions;

const TWO_IMAGE_SIDECAR: &str = r#"{
    "a.png": {"p": "cat", "se": 1, "st": 20, "c": 7.5, "sa": "ddim"},
    "b.png": {"p": "dog", "se": 2, "st": 30, "c": 8.0, "sa": "plms"}
}"#;

fn shard_archive_bytes(shard: u16, sidecar: &str, images: &[(&str, &[u8])]) -> Vec<u8> {
    let id = ShardId::new(shard.into()).expect("valid shard id");
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (name, bytes) in images {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .expect("failed starting zip entry");
        writer.write_all(bytes).expect("failed writing zip entry");
    }
    writer
        .start_file(ShardLocator::sidecar_filename(id), SimpleFileOptions::default())
        .expect("failed starting sidecar entry");
    writer
        .write_all(sidecar.as_bytes())
        .expect("failed writing sidecar entry");
    writer.finish().expect("failed finishing zip").into_inner()
}

fn write_shard_archive(mirror: &Path, shard: u16, sidecar: &str, images: &[(&str, &[u8])]) {
    let id = ShardId::new(shard.into()).expect("valid shard id");
    let path = mirror.join(ShardLocator::default().locate(id).path());
    fs::create_dir_all(path.parent().expect("archive has a parent")).expect("failed creating images dir");
    fs::write(&path, shard_archive_bytes(shard, sidecar, images)).expect("failed writing archive");
}

fn write_table(path: &Path, rows: &[TextExample]) {
    let schema = Arc::new(
        parse_message_type(
            "message metadata {
                REQUIRED BINARY image_name (UTF8);
                REQUIRED BINARY prompt (UTF8);
                REQUIRED INT64 part_id;
                REQUIRED INT64 seed;
                REQUIRED INT64 step;
                REQUIRED FLOAT cfg;
                REQUIRED INT64 sampler;
            }",
        )
        .expect("valid parquet schema"),
    );
    let props = Arc::new(WriterProperties::builder().build());
    let file = File::create(path).expect("failed creating parquet file");
    let mut writer = SerializedFileWriter::new(file, schema, props).expect("failed creating writer");
    let mut group = writer.next_row_group().expect("failed opening row group");

    let strings = [
        rows.iter().map(|r| ByteArray::from(r.image_name.as_str())).collect::<Vec<_>>(),
        rows.iter().map(|r| ByteArray::from(r.prompt.as_str())).collect::<Vec<_>>(),
    ];
    for values in strings {
        let mut column = group.next_column().expect("column").expect("column exists");
        column
            .typed::<ByteArrayType>()
            .write_batch(&values, None, None)
            .expect("failed writing strings");
        column.close().expect("failed closing column");
    }
    let longs = [
        rows.iter().map(|r| r.part_id).collect::<Vec<_>>(),
        rows.iter().map(|r| r.seed).collect::<Vec<_>>(),
        rows.iter().map(|r| r.step).collect::<Vec<_>>(),
    ];
    for values in longs {
        let mut column = group.next_column().expect("column").expect("column exists");
        column
            .typed::<Int64Type>()
            .write_batch(&values, None, None)
            .expect("failed writing longs");
        column.close().expect("failed closing column");
    }
    let cfgs = rows.iter().map(|r| r.cfg).collect::<Vec<_>>();
    let mut column = group.next_column().expect("column").expect("column exists");
    column
        .typed::<FloatType>()
        .write_batch(&cfgs, None, None)
        .expect("failed writing cfg");
    column.close().expect("failed closing column");
    let codes = rows.iter().map(|r| r.sampler.code()).collect::<Vec<_>>();
    let mut column = group.next_column().expect("column").expect("column exists");
    column
        .typed::<Int64Type>()
        .write_batch(&codes, None, None)
        .expect("failed writing sampler codes");
    column.close().expect("failed closing column");

    group.close().expect("failed closing row group");
    writer.close().expect("failed closing writer");
}

fn local_assembler(mirror: &Path, cache: &Path) -> Assembler {
    Assembler::new(
        Arc::new(Catalog::build(&CatalogOptions::seeded(11))),
        ShardLocator::default(),
        Arc::new(LocalFetcher::new(mirror, cache)),
    )
}

fn spawn_one_shot_http(payload: Vec<u8>) -> (String, thread::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("failed binding listener");
    let addr = listener.local_addr().expect("listener has an address");
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("failed accepting connection");
        let mut request_buf = [0u8; 1024];
        let _ = stream.read(&mut request_buf);
        let headers = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            payload.len()
        );
        stream.write_all(headers.as_bytes()).expect("failed writing headers");
        stream.write_all(&payload).expect("failed writing body");
        let _ = stream.flush();
    });
    (format!("http://{addr}"), handle)
}

#[test]
fn first_1k_streams_extracted_archive_in_sidecar_order() {
    let mirror = tempfile::tempdir().expect("failed creating mirror dir");
    let cache = tempfile::tempdir().expect("failed creating cache dir");
    write_shard_archive(
        mirror.path(),
        1,
        TWO_IMAGE_SIDECAR,
        &[("b.png", b"bbb"), ("a.png", b"aaa")],
    );

    let assembler = local_assembler(mirror.path(), cache.path());
    let records: Vec<_> = assembler
        .stream("first_1k")
        .expect("first_1k exists")
        .collect::<Result<_, _>>()
        .expect("stream succeeds");

    assert_eq!(records.len(), 2);
    let (key, first) = &records[0];
    assert_eq!(key, "a.png");
    let Example::Image(first) = first else {
        panic!("expected an image example");
    };
    assert_eq!(first.prompt, "cat");
    assert_eq!((first.seed, first.step, first.cfg), (1, 20, 7.5));
    assert_eq!(first.sampler, Sampler::Ddim);
    assert_eq!(first.image.bytes, b"aaa");
    assert!(first.image.path.starts_with(cache.path()));

    let (key, second) = &records[1];
    assert_eq!(key, "b.png");
    assert_eq!(second.prompt(), "dog");
    assert_eq!(second.sampler().as_str(), "plms");
}

#[test]
fn extracted_shards_are_reused_across_streams() {
    let mirror = tempfile::tempdir().expect("failed creating mirror dir");
    let cache = tempfile::tempdir().expect("failed creating cache dir");
    write_shard_archive(mirror.path(), 1, TWO_IMAGE_SIDECAR, &[("a.png", b"a"), ("b.png", b"b")]);
    let assembler = local_assembler(mirror.path(), cache.path());

    assert_eq!(assembler.stream("first_1k").expect("exists").count(), 2);
    fs::remove_file(mirror.path().join("images/part-000001.zip")).expect("failed removing archive");
    let again: Vec<_> = assembler
        .stream("first_1k")
        .expect("exists")
        .map(|item| item.expect("cached shard streams").0)
        .collect();
    assert_eq!(again, vec!["a.png", "b.png"]);
}

#[test]
fn missing_image_surfaces_after_earlier_records() {
    let mirror = tempfile::tempdir().expect("failed creating mirror dir");
    let cache = tempfile::tempdir().expect("failed creating cache dir");
    write_shard_archive(mirror.path(), 1, TWO_IMAGE_SIDECAR, &[("a.png", b"aaa")]);

    let assembler = local_assembler(mirror.path(), cache.path());
    let mut stream = assembler.stream("first_1k").expect("first_1k exists");
    let (key, _) = stream.next().expect("one record").expect("first record loads");
    assert_eq!(key, "a.png");

    match stream.next() {
        Some(Err(DatasetError::MissingAsset { path })) => assert!(path.ends_with("b.png")),
        other => panic!("expected MissingAsset, got {other:?}"),
    }
    assert_eq!(stream.state(), StreamState::Exhausted);
    assert!(stream.next().is_none());
}

#[test]
fn fetch_failures_pass_through_unchanged() {
    let mirror = tempfile::tempdir().expect("failed creating mirror dir");
    let cache = tempfile::tempdir().expect("failed creating cache dir");
    let assembler = local_assembler(mirror.path(), cache.path());

    let mut stream = assembler.stream("first_1k").expect("first_1k exists");
    match stream.next() {
        Some(Err(DatasetError::ResourceUnavailable { resource, .. })) => {
            assert_eq!(resource, "datasets/poloclub/diffusiondb/images/part-000001.zip")
        }
        other => panic!("expected ResourceUnavailable, got {other:?}"),
    }
    assert!(stream.next().is_none());
}

#[test]
fn corrupt_sidecar_stops_the_stream() {
    let mirror = tempfile::tempdir().expect("failed creating mirror dir");
    let cache = tempfile::tempdir().expect("failed creating cache dir");
    write_shard_archive(mirror.path(), 1, "{\"a.png\": 5}", &[("a.png", b"aaa")]);

    let assembler = local_assembler(mirror.path(), cache.path());
    let mut stream = assembler.stream("first_1k").expect("first_1k exists");
    assert!(matches!(
        stream.next(),
        Some(Err(DatasetError::CorruptMetadata { .. }))
    ));
    assert!(stream.next().is_none());
}

#[test]
fn text_only_streams_table_rows() {
    let mirror = tempfile::tempdir().expect("failed creating mirror dir");
    let cache = tempfile::tempdir().expect("failed creating cache dir");
    let row = TextExample {
        image_name: "x".to_string(),
        prompt: "dog".to_string(),
        part_id: 3,
        seed: 9,
        step: 10,
        cfg: 6.0,
        sampler: Sampler::Plms,
    };
    write_table(&mirror.path().join("metadata.parquet"), std::slice::from_ref(&row));

    let assembler = local_assembler(mirror.path(), cache.path());
    let mut stream = assembler.stream("text_only").expect("text_only exists");
    assert_eq!(stream.kind(), ExampleKind::Text);

    let (key, example) = stream.next().expect("one row").expect("row loads");
    assert_eq!(key, "x");
    assert_eq!(example, Example::Text(row));
    assert_eq!(stream.state(), StreamState::InTable { position: 1 });
    assert!(stream.next().is_none());
    assert_eq!(stream.state(), StreamState::Exhausted);
    assert_eq!(stream.emitted(), 1);
}

#[test]
fn http_mirror_serves_shard_archives() {
    let archive = shard_archive_bytes(1, TWO_IMAGE_SIDECAR, &[("a.png", b"a"), ("b.png", b"b")]);
    let (base, handle) = spawn_one_shot_http(archive);
    let cache = tempfile::tempdir().expect("failed creating cache dir");

    let assembler = Assembler::new(
        Arc::new(Catalog::default()),
        ShardLocator::default(),
        Arc::new(HttpFetcher::new(base, cache.path())),
    );
    let keys: Vec<_> = assembler
        .stream("first_1k")
        .expect("first_1k exists")
        .map(|item| item.expect("http shard streams").0)
        .collect();
    handle.join().expect("server thread finished");
    assert_eq!(keys, vec!["a.png", "b.png"]);
}

#[test]
fn unknown_configuration_names_are_rejected() {
    let mirror = tempfile::tempdir().expect("failed creating mirror dir");
    let assembler = local_assembler(mirror.path(), mirror.path());
    for name in ["", "first_2k", "FIRST_1K", "random"] {
        match assembler.stream(name) {
            Err(DatasetError::ConfigurationNotFound { name: missing }) => assert_eq!(missing, name),
            Err(other) => panic!("unexpected error for '{name}': {other}"),
            Ok(_) => panic!("'{name}' should not resolve"),
        }
    }
}
