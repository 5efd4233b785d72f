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

mod credentials;
mod lock;
mod requests;
mod xcap;
mod xlocset;

pub use self::credentials::{Auth, UserCredentials};
pub use self::lock::Lock;
pub use self::requests::{
    FileCredentials, LockRequest, ObjectData, OsdWriteResponse, ReadRequest, TruncateRequest,
    UpdateFileSizeRequest, WriteRequest,
};
pub use self::xcap::XCap;
pub use self::xlocset::{
    ReplicaUpdatePolicy, Replica, ReplicationFlags, StripingPolicy, StripingPolicyType, XLocSet,
};
