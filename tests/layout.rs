// Layout conformance tests for the mailbox region.
// These tests assert sizes, alignments, and field offsets for
// MailboxHeader and SlotHeader. They also print the observed values
// to aid debugging when a mismatch occurs on a given platform.
use memoffset::offset_of;
use shmem_mpi::Mailbox::layout::{
    region_size, slot_offset, MailboxHeader, SlotHeader, EMPTY_DEST, LAYOUT_VERSION, MAGIC_NUMBER,
};
use std::mem::{align_of, size_of};

#[test]
fn test_slot_header_layout() {
    let size = size_of::<SlotHeader>();
    let align = align_of::<SlotHeader>();
    let off_source = offset_of!(SlotHeader, source);
    let off_dest = offset_of!(SlotHeader, dest);
    let off_tag = offset_of!(SlotHeader, tag);
    let off_reserved = offset_of!(SlotHeader, reserved);
    let off_length = offset_of!(SlotHeader, length);

    println!(
        "SlotHeader => size: {size}, align: {align}, offsets: [source:{off_source}, dest:{off_dest}, tag:{off_tag}, reserved:{off_reserved}, length:{off_length}]"
    );

    // One slot per cache line
    assert_eq!(align, 64);
    assert_eq!(size, 64);
    assert_eq!(off_source, 0);
    assert_eq!(off_dest, 4);
    assert_eq!(off_tag, 8);
    assert_eq!(off_reserved, 12);
    assert_eq!(off_length, 16);
}

#[test]
fn test_mailbox_header_layout() {
    let size = size_of::<MailboxHeader>();
    let align = align_of::<MailboxHeader>();

    println!(
        "MailboxHeader => size: {size}, align: {align}, offsets: [magic:{}, version:{}, rank_count:{}, slot_offset:{}, installs:{}, removals:{}]",
        offset_of!(MailboxHeader, magic),
        offset_of!(MailboxHeader, version),
        offset_of!(MailboxHeader, rank_count),
        offset_of!(MailboxHeader, slot_offset),
        offset_of!(MailboxHeader, installs),
        offset_of!(MailboxHeader, removals),
    );

    assert_eq!(align, 128);
    assert_eq!(size, 128);
    assert_eq!(offset_of!(MailboxHeader, magic), 0);
    assert_eq!(offset_of!(MailboxHeader, version), 8);
    assert_eq!(offset_of!(MailboxHeader, rank_count), 12);
    assert_eq!(offset_of!(MailboxHeader, slot_offset), 16);
    assert_eq!(offset_of!(MailboxHeader, installs), 24);
    assert_eq!(offset_of!(MailboxHeader, removals), 32);
}

#[test]
fn test_region_size() {
    assert_eq!(slot_offset(), size_of::<MailboxHeader>());
    assert_eq!(region_size(0), 128);
    assert_eq!(region_size(1), 128 + 64);
    assert_eq!(region_size(16), 128 + 16 * 64);
}

#[test]
fn test_empty_slot_sentinel() {
    let slot = SlotHeader::EMPTY;
    assert!(slot.is_empty());
    assert_eq!(slot.dest, EMPTY_DEST);
    assert_eq!(slot.length, 0);

    let occupied = SlotHeader { dest: 0, ..SlotHeader::EMPTY };
    assert!(!occupied.is_empty());

    // "SHMPIMBX"
    assert_eq!(&MAGIC_NUMBER.to_be_bytes(), b"SHMPIMBX");
    assert_eq!(LAYOUT_VERSION, 1);
}
