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

use async_trait::async_trait;
use capfs_common::state::*;
use capfs_common::FsResult;

/// Metadata service operations used by open files.
///
/// `server` is the resolved address of the endpoint the call goes to.
#[async_trait]
pub trait MrcServiceClient: Send + Sync {
    async fn renew_capability(
        &self,
        server: &str,
        auth: &Auth,
        creds: &UserCredentials,
        xcap: XCap,
    ) -> FsResult<XCap>;

    /// First phase of a truncate, returns a capability with a bumped
    /// truncate epoch.
    async fn ftruncate(
        &self,
        server: &str,
        auth: &Auth,
        creds: &UserCredentials,
        xcap: XCap,
    ) -> FsResult<XCap>;

    async fn update_file_size(
        &self,
        server: &str,
        auth: &Auth,
        creds: &UserCredentials,
        req: UpdateFileSizeRequest,
    ) -> FsResult<()>;
}

/// Storage service operations on file objects and advisory locks.
#[async_trait]
pub trait OsdServiceClient: Send + Sync {
    async fn read(
        &self,
        server: &str,
        auth: &Auth,
        creds: &UserCredentials,
        req: ReadRequest,
    ) -> FsResult<ObjectData>;

    async fn write(
        &self,
        server: &str,
        auth: &Auth,
        creds: &UserCredentials,
        req: WriteRequest,
    ) -> FsResult<OsdWriteResponse>;

    async fn truncate(
        &self,
        server: &str,
        auth: &Auth,
        creds: &UserCredentials,
        req: TruncateRequest,
    ) -> FsResult<OsdWriteResponse>;

    async fn lock_acquire(
        &self,
        server: &str,
        auth: &Auth,
        creds: &UserCredentials,
        req: LockRequest,
    ) -> FsResult<Lock>;

    async fn lock_check(
        &self,
        server: &str,
        auth: &Auth,
        creds: &UserCredentials,
        req: LockRequest,
    ) -> FsResult<Lock>;

    async fn lock_release(
        &self,
        server: &str,
        auth: &Auth,
        creds: &UserCredentials,
        req: LockRequest,
    ) -> FsResult<()>;
}
