// Copyright 2023 Strixpyrr
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

//! [`Source`](crate::stream::Source)/[`Sink`](crate::stream::Sink) decorators
//! layered on narrow traits so the core crate doesn't hard-code a particular
//! compression or cryptography backend: [`hashing`] observes bytes in transit
//! without modifying them, [`cipher`] and [`deflate`] transform them, and
//! [`throttle`] paces them.

#[cfg(feature = "hash")]
pub mod hashing;
#[cfg(feature = "cipher-aes")]
pub mod cipher;
#[cfg(feature = "gzip")]
pub mod deflate;
pub mod throttle;
