//! Property tests: the in-place editor must agree with plain `Vec` splicing.

use byte_splice::{RandomAccessStream, RangeEditor, Splice};
use proptest::prelude::*;
use std::io::{self, Cursor, SeekFrom};

/// Caps every read, so window refills are exercised on every shift.
struct ChoppyStream {
    inner: Cursor<Vec<u8>>,
    max_read: usize,
}

impl RandomAccessStream for ChoppyStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        RandomAccessStream::seek(&mut self.inner, pos)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let end = buf.len().min(self.max_read);
        RandomAccessStream::read(&mut self.inner, &mut buf[..end])
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        RandomAccessStream::write_all(&mut self.inner, buf)
    }

    fn set_len(&mut self, len: u64) -> io::Result<()> {
        RandomAccessStream::set_len(&mut self.inner, len)
    }

    fn len(&mut self) -> io::Result<u64> {
        RandomAccessStream::len(&mut self.inner)
    }
}

/// Content plus a valid `(offset, count)` range inside it.
fn content_and_range() -> impl Strategy<Value = (Vec<u8>, u64, u64)> {
    prop::collection::vec(any::<u8>(), 0..300).prop_flat_map(|content| {
        let len = content.len();
        (Just(content), 0..=len).prop_flat_map(|(content, offset)| {
            let max_count = content.len() - offset;
            (Just(content), Just(offset as u64), (0..=max_count).prop_map(|c| c as u64))
        })
    })
}

#[derive(Debug, Clone)]
enum BatchEdit {
    Delete(u64),
    Insert(Vec<u8>),
    Update(u64, Vec<u8>),
}

fn batch_edit() -> impl Strategy<Value = BatchEdit> {
    prop_oneof![
        (1..=2u64).prop_map(BatchEdit::Delete),
        prop::collection::vec(any::<u8>(), 1..6).prop_map(BatchEdit::Insert),
        (1..=2u64, prop::collection::vec(any::<u8>(), 0..6))
            .prop_map(|(count, data)| BatchEdit::Update(count, data)),
    ]
}

/// Optional insert listed just before the splice at the same offset.
fn lead_insert() -> impl Strategy<Value = Option<Vec<u8>>> {
    prop::option::of(prop::collection::vec(any::<u8>(), 1..4))
}

proptest! {
    #[test]
    fn prop_delete_matches_vec(
        (content, offset, count) in content_and_range(),
        max_read in 1..64usize,
    ) {
        let mut stream = ChoppyStream { inner: Cursor::new(content.clone()), max_read };
        RangeEditor::new(&mut stream).delete_range(offset, count).unwrap();

        let mut expected = content;
        expected.drain(offset as usize..(offset + count) as usize);
        prop_assert_eq!(stream.inner.into_inner(), expected);
    }

    #[test]
    fn prop_insert_then_delete_round_trips(
        (content, offset, _) in content_and_range(),
        data in prop::collection::vec(any::<u8>(), 1..200),
        max_read in 1..64usize,
    ) {
        let mut stream = ChoppyStream { inner: Cursor::new(content.clone()), max_read };
        let mut editor = RangeEditor::new(&mut stream);
        editor.insert(offset, &data).unwrap();
        editor.delete_range(offset, data.len() as u64).unwrap();
        drop(editor);

        prop_assert_eq!(stream.inner.into_inner(), content);
    }

    #[test]
    fn prop_update_matches_vec(
        (content, offset, count) in content_and_range(),
        data in prop::collection::vec(any::<u8>(), 0..200),
        max_read in 1..64usize,
    ) {
        let mut stream = ChoppyStream { inner: Cursor::new(content.clone()), max_read };
        RangeEditor::new(&mut stream).update(offset, count, &data).unwrap();

        let mut expected = content;
        expected.splice(offset as usize..(offset + count) as usize, data.iter().copied());
        prop_assert_eq!(stream.inner.into_inner(), expected);
    }

    #[test]
    fn prop_equal_update_is_delete_then_insert(
        (content, offset, count) in content_and_range(),
        fill in any::<u8>(),
    ) {
        prop_assume!(count > 0);
        let data = vec![fill; count as usize];

        let mut updated = Cursor::new(content.clone());
        RangeEditor::new(&mut updated).update(offset, count, &data).unwrap();

        let mut spliced = Cursor::new(content);
        let mut editor = RangeEditor::new(&mut spliced);
        editor.delete_range(offset, count).unwrap();
        editor.insert(offset, &data).unwrap();
        drop(editor);

        prop_assert_eq!(updated.into_inner(), spliced.into_inner());
    }

    #[test]
    fn prop_batch_matches_sequential_vec_edits(
        content in prop::collection::vec(any::<u8>(), 120..200),
        points in prop::collection::btree_map(0..40u64, (lead_insert(), batch_edit()), 1..8),
        max_read in 1..16usize,
    ) {
        // Points are three bytes apart and ranges span at most two, so only
        // a leading insert ever shares an offset with another splice.
        let mut splices = Vec::new();
        for (&point, (lead, edit)) in points.iter().rev() {
            let offset = point * 3;
            if let Some(lead) = lead {
                splices.push(Splice::insert(offset, lead.clone()));
            }
            splices.push(match edit {
                BatchEdit::Delete(count) => Splice::delete(offset, *count),
                BatchEdit::Insert(data) => Splice::insert(offset, data.clone()),
                BatchEdit::Update(count, data) => Splice::update(offset, *count, data.clone()),
            });
        }

        let mut stream = ChoppyStream { inner: Cursor::new(content.clone()), max_read };
        Splice::apply_batch(&mut stream, &splices).unwrap();

        let mut expected = content;
        for (&point, (lead, edit)) in points.iter().rev() {
            let start = (point * 3) as usize;
            let (count, data) = match edit {
                BatchEdit::Delete(count) => (*count as usize, Vec::new()),
                BatchEdit::Insert(data) => (0, data.clone()),
                BatchEdit::Update(count, data) => (*count as usize, data.clone()),
            };
            let replacement = lead.iter().flatten().chain(data.iter()).copied();
            expected.splice(start..start + count, replacement);
        }
        prop_assert_eq!(stream.inner.into_inner(), expected);
    }
}

#[test]
fn test_boundaries() {
    let content = b"ABCDEFGHIJ".to_vec();

    let mut stream = Cursor::new(content.clone());
    RangeEditor::new(&mut stream).delete_range(0, 10).unwrap();
    assert!(stream.get_ref().is_empty());

    let mut stream = Cursor::new(content);
    RangeEditor::new(&mut stream).insert(10, b"KLM").unwrap();
    assert_eq!(stream.get_ref(), b"ABCDEFGHIJKLM");
}
