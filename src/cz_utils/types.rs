// Copyright 2019 Karl Sundequist Blomdahl <karl.sundequist.blomdahl@gmail.com>
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

use std::mem::transmute;

/// A half-precision (IEEE 754 binary16) float, used for the wire format of
/// input planes and network weights so that a batch of positions is cheap
/// to copy across the search/network boundary.
#[derive(Clone, Copy, Debug, PartialEq)]
#[repr(transparent)]
pub struct f16(u16);

impl f16 {
    pub fn from_bits(bits: u16) -> Self {
        f16(bits)
    }

    pub fn to_bits(self) -> u16 {
        self.0
    }
}

impl From<f32> for f16 {
    fn from(value: f32) -> Self {
        let bits: u32 = unsafe { transmute(value) };
        let sign = (bits >> 16) & 0x8000;
        let exp = ((bits >> 23) & 0xff) as i32 - 127 + 15;
        let man = bits & 0x7f_ffff;

        if exp <= 0 {
            // flush subnormals (and zero) to zero, this network never
            // produces gradients that small in practice.
            f16((sign) as u16)
        } else if exp >= 0x1f {
            // overflow to infinity, preserving the sign.
            f16((sign | 0x7c00) as u16)
        } else {
            f16((sign | ((exp as u32) << 10) | (man >> 13)) as u16)
        }
    }
}

impl From<f16> for f32 {
    fn from(value: f16) -> Self {
        let i = value.0;

        // check for signed zero
        if i & 0x7fff == 0 {
            return unsafe { transmute((i as u32) << 16) };
        }

        let half_sign = (i & 0x8000) as u32;
        let half_exp = (i & 0x7c00) as u32;
        let half_man = (i & 0x03ff) as u32;

        if half_exp == 0x7c00 {
            return if half_man == 0 {
                unsafe { transmute((half_sign << 16) | 0x7f80_0000) }
            } else {
                ::std::f32::NAN
            };
        }

        let sign = half_sign << 16;
        let unbiased_exp = ((half_exp as i32) >> 10) - 15;
        let man = (half_man & 0x03ff) << 13;

        if half_exp == 0 {
            // subnormal, normalize by shifting until the implicit leading
            // bit would be set.
            let mut e_adj = 0;
            let mut hm_adj = half_man << 1;

            while hm_adj & 0x0400 == 0 {
                e_adj += 1;
                hm_adj <<= 1;
            }

            let exp = ((unbiased_exp + 127 - e_adj) << 23) as u32;
            return unsafe { transmute(sign | exp | man) };
        }

        let exp = ((unbiased_exp + 127) << 23) as u32;
        unsafe { transmute(sign | exp | man) }
    }
}

impl Default for f16 {
    fn default() -> Self {
        f16(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_common_values() {
        for &value in &[0.0f32, 1.0, -1.0, 0.5, -0.5, 3.140625, 2.71875] {
            let half = f16::from(value);
            let back: f32 = half.into();

            assert_eq!(back, value);
        }
    }

    #[test]
    fn preserves_sign_of_zero() {
        let half = f16::from(-0.0f32);

        assert_eq!(half.to_bits() & 0x8000, 0x8000);
    }

    #[test]
    fn saturates_large_magnitudes_to_infinity() {
        let half = f16::from(1.0e6f32);
        let back: f32 = half.into();

        assert!(back.is_infinite());
    }
}
