// Copyright 2025 OPPO.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::striping::{ReadOperation, StripeTranslator, WriteOperation};
use bytes::Bytes;
use capfs_common::state::{StripingPolicy, StripingPolicyType};
use capfs_common::error::{FsError, PosixErrno};
use capfs_common::FsResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Segment {
    obj_number: u64,
    osd_offset: usize,
    req_offset: u64,
    req_size: u64,
    buf_start: usize,
}

/// RAID0 striping: object `n` covers bytes `[n * stripe_size, (n + 1) * stripe_size)`
/// of the file and lives on OSD `n % width`.
#[derive(Debug, Default)]
pub struct StripeTranslatorRaid0;

impl StripeTranslatorRaid0 {
    pub fn new() -> Self {
        Self
    }

    fn segments(size: usize, offset: u64, policy: &StripingPolicy) -> FsResult<Vec<Segment>> {
        if policy.stripe_size == 0 || policy.width == 0 {
            return Err(FsError::config(format!(
                "invalid raid0 policy, stripe_size = {}, width = {}",
                policy.stripe_size, policy.width
            )));
        }

        let stripe_size = policy.stripe_size;
        let width = policy.width as u64;
        let mut res = vec![];
        let mut pos = offset;
        let mut buf_start = 0usize;
        let end = match offset.checked_add(size as u64) {
            Some(v) => v,
            None => {
                return Err(FsError::posix(
                    PosixErrno::EFBIG,
                    format!("range of {} bytes at offset {} is too large", size, offset),
                ))
            }
        };

        while pos < end {
            let obj_number = pos / stripe_size;
            let req_offset = pos % stripe_size;
            let req_size = (stripe_size - req_offset).min(end - pos);

            res.push(Segment {
                obj_number,
                osd_offset: (obj_number % width) as usize,
                req_offset,
                req_size,
                buf_start,
            });

            pos += req_size;
            buf_start += req_size as usize;
        }

        Ok(res)
    }
}

impl StripeTranslator for StripeTranslatorRaid0 {
    fn policy_type(&self) -> StripingPolicyType {
        StripingPolicyType::Raid0
    }

    fn translate_read_request(
        &self,
        size: usize,
        offset: u64,
        policy: &StripingPolicy,
    ) -> FsResult<Vec<ReadOperation>> {
        let ops = Self::segments(size, offset, policy)?
            .into_iter()
            .map(|s| ReadOperation {
                obj_number: s.obj_number,
                osd_offset: s.osd_offset,
                req_size: s.req_size,
                req_offset: s.req_offset,
                buf_start: s.buf_start,
            })
            .collect();
        Ok(ops)
    }

    fn translate_write_request(
        &self,
        data: &Bytes,
        offset: u64,
        policy: &StripingPolicy,
    ) -> FsResult<Vec<WriteOperation>> {
        let ops = Self::segments(data.len(), offset, policy)?
            .into_iter()
            .map(|s| WriteOperation {
                obj_number: s.obj_number,
                osd_offset: s.osd_offset,
                req_size: s.req_size,
                req_offset: s.req_offset,
                buf_start: s.buf_start,
                req_data: data.slice(s.buf_start..s.buf_start + s.req_size as usize),
            })
            .collect();
        Ok(ops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_two_objects() {
        let policy = StripingPolicy::raid0(4096, 1);
        let ops = StripeTranslatorRaid0
            .translate_read_request(8192, 0, &policy)
            .unwrap();

        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].obj_number, 0);
        assert_eq!(ops[0].req_offset, 0);
        assert_eq!(ops[0].req_size, 4096);
        assert_eq!(ops[0].buf_start, 0);
        assert_eq!(ops[1].obj_number, 1);
        assert_eq!(ops[1].req_size, 4096);
        assert_eq!(ops[1].buf_start, 4096);
        assert!(ops.iter().all(|x| x.osd_offset == 0));
    }

    #[test]
    fn unaligned_ranges_are_contiguous() {
        let policy = StripingPolicy::raid0(1000, 3);
        for (offset, size) in [(0u64, 1usize), (999, 2), (1500, 4321), (7, 999), (3000, 3000)] {
            let ops = StripeTranslatorRaid0
                .translate_read_request(size, offset, &policy)
                .unwrap();

            let mut expect_buf = 0usize;
            let mut expect_pos = offset;
            for op in &ops {
                assert_eq!(op.buf_start, expect_buf);
                assert_eq!(op.obj_number * 1000 + op.req_offset, expect_pos);
                assert!(op.req_offset + op.req_size <= 1000);
                assert_eq!(op.osd_offset as u64, op.obj_number % 3);
                expect_buf += op.req_size as usize;
                expect_pos += op.req_size;
            }
            assert_eq!(expect_buf, size);
        }
    }

    #[test]
    fn write_slices_data() {
        let policy = StripingPolicy::raid0(4, 2);
        let data = Bytes::from_static(b"abcdefghij");
        let ops = StripeTranslatorRaid0
            .translate_write_request(&data, 2, &policy)
            .unwrap();

        let chunks: Vec<&[u8]> = ops.iter().map(|x| x.req_data.as_ref()).collect();
        assert_eq!(chunks, vec![&b"ab"[..], b"cdef", b"ghij"]);
        assert_eq!(
            ops.iter().map(|x| x.osd_offset).collect::<Vec<_>>(),
            vec![0, 1, 0]
        );
        assert_eq!(ops[0].req_offset, 2);
    }

    #[test]
    fn empty_and_invalid() {
        let policy = StripingPolicy::raid0(4096, 1);
        assert!(StripeTranslatorRaid0
            .translate_read_request(0, 100, &policy)
            .unwrap()
            .is_empty());

        let bad = StripingPolicy::raid0(0, 1);
        let err = StripeTranslatorRaid0
            .translate_read_request(10, 0, &bad)
            .unwrap_err();
        assert!(matches!(err, FsError::Config(_)));
        assert!(!err.should_retry());

        let bad = StripingPolicy::raid0(4096, 0);
        assert!(matches!(
            StripeTranslatorRaid0.translate_read_request(10, 0, &bad),
            Err(FsError::Config(_))
        ));
    }

    #[test]
    fn range_past_u64_max() {
        let policy = StripingPolicy::raid0(4096, 1);
        assert!(StripeTranslatorRaid0
            .translate_read_request(10, u64::MAX - 4, &policy)
            .unwrap_err()
            .is_errno(PosixErrno::EFBIG));
        let data = Bytes::from_static(b"0123456789");
        assert!(StripeTranslatorRaid0
            .translate_write_request(&data, u64::MAX - 4, &policy)
            .is_err());
    }
}
