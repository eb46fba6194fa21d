//! Batch behaviour against both storage modes.

mod common;

use rstest::rstest;

use common::{Storage, TestContext, QUAD, TRIANGLE};
use glkit::backend::{AttributeKind, RecordedCall, RecordedIndices};
use glkit::geometry::{BufferFormat, GeometryError};
use glkit::resources::Batch;
use glkit::PrimitiveType;

fn triangle_batch() -> Batch {
    let mut batch = Batch::new();
    batch.set_vertices(&TRIANGLE, 3).unwrap();
    batch.set_vertex_count(3);
    batch
}

#[rstest]
#[case::client_arrays(Storage::ClientArrays)]
#[case::buffer_objects(Storage::BufferObjects)]
fn test_byte_size_of_format(#[case] storage: Storage) {
    let t = TestContext::new(storage);
    let mut batch = triangle_batch();
    batch.set_normals(&[0.0, 0.0, 1.0].repeat(3)).unwrap();
    batch.set_indices(&[0, 1, 2]);
    batch.update(&t.ctx).unwrap();

    let format = *batch.buffer().unwrap().format();
    assert_eq!(format.vertex_stride(), 24);
    assert_eq!(format.byte_size(), 3 * 24);
    assert_eq!(format.index_byte_size(), 3 * 4);
}

#[test]
fn test_best_format_skips_unset_streams() {
    let mut batch = triangle_batch();
    batch.set_colors(&[1.0; 12], 4).unwrap();
    let format = batch.best_buffer_format();

    assert_eq!(format.components(AttributeKind::Vertex), 3);
    assert_eq!(format.components(AttributeKind::Color), 4);
    assert_eq!(format.components(AttributeKind::Normal), 0);
    assert_eq!(format.components(AttributeKind::TexCoord), 0);
    assert_eq!(format.vertex_count, 3);
    assert!(!format.is_indexed());
}

#[rstest]
#[case::client_arrays(Storage::ClientArrays)]
#[case::buffer_objects(Storage::BufferObjects)]
fn test_private_buffer_holds_data(#[case] storage: Storage) {
    let t = TestContext::new(storage);
    let mut batch = triangle_batch();
    let colors = [0.5f32; 9];
    batch.set_colors(&colors, 3).unwrap();
    batch.update(&t.ctx).unwrap();

    let data = t.vertex_data(&batch.buffer().unwrap());
    assert_eq!(&data[..9], &TRIANGLE);
    assert_eq!(&data[9..18], &colors);
}

#[rstest]
#[case::client_arrays(Storage::ClientArrays)]
#[case::buffer_objects(Storage::BufferObjects)]
fn test_shared_buffer_offsets_and_indices(#[case] storage: Storage) {
    let t = TestContext::new(storage);
    let mut first = triangle_batch();
    first.set_indices(&[0, 1, 2]);
    let mut second = Batch::new();
    second.set_vertices(&[2.0; 15], 3).unwrap();
    second.set_vertex_count(5);
    second.set_indices(&[0, 1, 2]);

    let shared = Batch::create_shared_buffer(&t.ctx, &mut [&mut first, &mut second]).unwrap();
    assert_eq!(shared.format().vertex_count, 8);
    assert_eq!(shared.format().index_count, 6);
    assert_eq!((first.vertex_offset(), first.index_offset()), (0, 0));
    assert_eq!((second.vertex_offset(), second.index_offset()), (3, 3));
    assert_eq!(shared.holders(), 3);

    first.update(&t.ctx).unwrap();
    second.update(&t.ctx).unwrap();

    let buffer = shared.borrow();
    assert_eq!(t.index_data(&buffer), vec![0, 1, 2, 3, 4, 5]);
    let vertices = t.vertex_data(&buffer);
    assert_eq!(&vertices[..9], &TRIANGLE);
    assert_eq!(&vertices[9..24], &[2.0; 15]);
}

#[rstest]
#[case::client_arrays(Storage::ClientArrays)]
#[case::buffer_objects(Storage::BufferObjects)]
fn test_clean_update_does_nothing(#[case] storage: Storage) {
    let t = TestContext::new(storage);
    let mut batch = triangle_batch();
    batch.update(&t.ctx).unwrap();
    assert!(!batch.is_dirty());

    t.backend.clear_calls();
    batch.update(&t.ctx).unwrap();
    assert!(t.backend.calls().is_empty());
    assert_eq!(t.backend.upload_count(), 0);
}

#[rstest]
#[case::client_arrays(Storage::ClientArrays)]
#[case::buffer_objects(Storage::BufferObjects)]
fn test_render_once_needs_bound_buffer(#[case] storage: Storage) {
    let t = TestContext::new(storage);
    let mut batch = triangle_batch();
    assert_eq!(batch.render_once(), Err(GeometryError::NotBound));

    batch.update(&t.ctx).unwrap();
    assert_eq!(batch.render_once(), Err(GeometryError::NotBound));
    assert!(t.draw_calls().is_empty());
}

#[rstest]
#[case::client_arrays(Storage::ClientArrays)]
#[case::buffer_objects(Storage::BufferObjects)]
fn test_colored_quad_draws_once(#[case] storage: Storage) {
    let t = TestContext::new(storage);
    let mut batch = Batch::new();
    batch.set_vertices(&QUAD, 3).unwrap();
    batch.set_colors(&[1.0, 0.0, 0.0].repeat(4), 3).unwrap();
    batch.set_vertex_count(4);
    batch.set_primitive_type(PrimitiveType::Quads);

    batch.render(&t.ctx).unwrap();

    assert_eq!(
        t.draw_calls(),
        vec![RecordedCall::DrawArrays {
            primitive: PrimitiveType::Quads,
            first: 0,
            count: 4,
        }]
    );
    assert!(!batch.buffer().unwrap().is_bound());
}

#[rstest]
#[case::client_arrays(Storage::ClientArrays)]
#[case::buffer_objects(Storage::BufferObjects)]
fn test_shared_batches_draw_their_own_range(#[case] storage: Storage) {
    let t = TestContext::new(storage);
    let mut first = triangle_batch();
    first.set_indices(&[0, 1, 2]);
    let mut second = triangle_batch();
    second.set_indices(&[2, 1, 0]);
    second.set_primitive_type(PrimitiveType::LineLoop);

    let shared = Batch::create_shared_buffer(&t.ctx, &mut [&mut first, &mut second]).unwrap();
    first.update(&t.ctx).unwrap();
    second.update(&t.ctx).unwrap();

    shared.bind();
    first.render_once().unwrap();
    second.render_once().unwrap();
    shared.unbind();

    let draws = t.draw_calls();
    assert_eq!(draws.len(), 2);
    match (&draws[0], &draws[1]) {
        (
            RecordedCall::DrawElements {
                primitive: PrimitiveType::Triangles,
                count: 3,
                indices: a,
            },
            RecordedCall::DrawElements {
                primitive: PrimitiveType::LineLoop,
                count: 3,
                indices: b,
            },
        ) => {
            if storage == Storage::BufferObjects {
                assert_eq!(*a, RecordedIndices::Offset(0));
                assert_eq!(*b, RecordedIndices::Offset(12));
            } else {
                assert_eq!(*a, RecordedIndices::Client(vec![0, 1, 2]));
                assert_eq!(*b, RecordedIndices::Client(vec![5, 4, 3]));
            }
        }
        other => panic!("unexpected draws {other:?}"),
    }
}

#[rstest]
#[case::client_arrays(Storage::ClientArrays)]
#[case::buffer_objects(Storage::BufferObjects)]
fn test_shared_layout_mismatch(#[case] storage: Storage) {
    let t = TestContext::new(storage);
    let mut first = triangle_batch();
    let mut second = triangle_batch();
    second.set_normals(&[0.0; 9]).unwrap();

    let err = Batch::create_shared_buffer(&t.ctx, &mut [&mut first, &mut second]).unwrap_err();
    assert!(matches!(err, GeometryError::IncompatibleFormats(_)));
    assert!(!first.is_shared());
}

#[rstest]
#[case::client_arrays(Storage::ClientArrays)]
#[case::buffer_objects(Storage::BufferObjects)]
fn test_layout_change_after_sharing(#[case] storage: Storage) {
    let t = TestContext::new(storage);
    let mut first = triangle_batch();
    let mut second = triangle_batch();
    let _shared = Batch::create_shared_buffer(&t.ctx, &mut [&mut first, &mut second]).unwrap();

    second.set_colors(&[1.0; 9], 3).unwrap();
    assert!(matches!(
        second.update(&t.ctx),
        Err(GeometryError::IncompatibleFormats(_))
    ));
    assert!(second.is_dirty());
    first.update(&t.ctx).unwrap();
}

#[test]
fn test_empty_batch_list() {
    let t = TestContext::new(Storage::BufferObjects);
    assert!(matches!(
        Batch::create_shared_buffer(&t.ctx, &mut []),
        Err(GeometryError::EmptyBatchList)
    ));
}

#[test]
fn test_short_stream_is_rejected() {
    let t = TestContext::new(Storage::ClientArrays);
    let mut batch = triangle_batch();
    batch.set_vertex_count(4);
    assert!(matches!(
        batch.update(&t.ctx),
        Err(GeometryError::InsufficientData { needed: 12, got: 9, .. })
    ));
    assert!(batch.is_dirty());
}

#[test]
fn test_failed_allocation_keeps_batch_dirty() {
    let t = TestContext::new(Storage::BufferObjects);
    let mut batch = triangle_batch();
    t.backend.fail_next_buffer_creation();
    assert!(matches!(batch.update(&t.ctx), Err(GeometryError::Backend(_))));
    assert!(batch.is_dirty());
    assert!(batch.buffer().is_none());

    batch.update(&t.ctx).unwrap();
    assert!(!batch.is_dirty());
}

#[test]
fn test_dropping_batch_frees_buffer() {
    let t = TestContext::new(Storage::BufferObjects);
    let mut batch = triangle_batch();
    batch.update(&t.ctx).unwrap();
    assert_eq!(t.backend.live_buffer_count(), 1);
    drop(batch);
    assert_eq!(t.backend.live_buffer_count(), 0);
}

#[test]
fn test_format_from_batch_matches_manual() {
    let batch = triangle_batch();
    let manual = BufferFormat::new(3, 0).with_vertices(3).unwrap();
    assert!(batch.best_buffer_format().same_layout(&manual));
}

#[rstest]
#[case::client_arrays(Storage::ClientArrays)]
#[case::buffer_objects(Storage::BufferObjects)]
fn test_huge_vertex_count_is_rejected(#[case] storage: Storage) {
    let t = TestContext::new(storage);
    let mut batch = triangle_batch();
    batch.set_vertex_count(usize::MAX / 2);
    assert!(matches!(
        batch.update(&t.ctx),
        Err(GeometryError::SizeOverflow { .. })
    ));
    assert!(batch.is_dirty());
    assert!(batch.buffer().is_none());
    assert_eq!(t.backend.live_buffer_count(), 0);
}

#[rstest]
#[case::client_arrays(Storage::ClientArrays)]
#[case::buffer_objects(Storage::BufferObjects)]
fn test_offset_past_shared_capacity(#[case] storage: Storage) {
    let t = TestContext::new(storage);
    let mut first = triangle_batch();
    let mut second = triangle_batch();
    let shared = Batch::create_shared_buffer(&t.ctx, &mut [&mut first, &mut second]).unwrap();
    assert_eq!(shared.borrow().format().vertex_count, 6);

    let mut straddling = Batch::with_buffer(shared.clone(), 5, 0);
    straddling.set_vertices(&TRIANGLE, 3).unwrap();
    straddling.set_vertex_count(3);
    assert!(matches!(
        straddling.update(&t.ctx),
        Err(GeometryError::OutOfRange {
            offset: 5,
            count: 3,
            capacity: 6,
            ..
        })
    ));
    assert!(straddling.is_dirty());

    let mut beyond = triangle_batch();
    beyond.set_buffer(shared.clone(), 7, 0);
    assert!(matches!(
        beyond.update(&t.ctx),
        Err(GeometryError::OutOfRange { offset: 7, .. })
    ));
    assert!(!shared.borrow().is_bound());
}
