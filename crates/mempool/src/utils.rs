use chainguard_primitives::{utils::div_ceil, UserOperation};
use ethers::types::U256;
use std::{
    ops::Deref,
    time::{SystemTime, UNIX_EPOCH},
};

/// Current unix timestamp in seconds
pub fn now_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

/// Struct to calculate the pre-verification gas of a user operation
// https://github.com/eth-infinitism/bundler/blob/main/packages/sdk/src/calcPreVerificationGas.ts#L44-L51
pub struct Overhead {
    pub fixed: U256,
    pub per_user_op: U256,
    pub per_user_op_word: U256,
    pub zero_byte: U256,
    pub non_zero_byte: U256,
    pub bundle_size: U256,
    pub sig_size: U256,
}

impl Default for Overhead {
    fn default() -> Self {
        Self {
            fixed: U256::from(21000),
            per_user_op: U256::from(18300),
            per_user_op_word: U256::from(4),
            zero_byte: U256::from(4),
            non_zero_byte: U256::from(16),
            bundle_size: U256::from(1),
            sig_size: U256::from(65),
        }
    }
}

impl Overhead {
    /// Calculates the pre-verification gas of a [UserOperation](UserOperation).
    ///
    /// The signature is substituted with `sig_size` bytes of `0x01` before packing, so the
    /// result does not depend on the signature the wallet eventually provides.
    pub fn calculate_pre_verification_gas(&self, uo: &UserOperation) -> U256 {
        let uo_pack =
            uo.clone().signature(vec![1u8; self.sig_size.as_usize()].into()).pack();

        let call_data = uo_pack.deref().iter().fold(U256::zero(), |acc, &x| {
            let byte_cost = if x == 0 { &self.zero_byte } else { &self.non_zero_byte };
            acc.saturating_add(*byte_cost)
        });

        // per_user_op_word * number of 32-byte words, rounded up
        let word_cost = div_ceil(
            self.per_user_op_word.saturating_mul(U256::from(uo_pack.len() + 31)),
            U256::from(32),
        );

        let fixed_divided_by_bundle_size = div_ceil(self.fixed, self.bundle_size);

        fixed_divided_by_bundle_size
            .saturating_add(call_data)
            .saturating_add(self.per_user_op)
            .saturating_add(word_cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::{Address, Bytes};

    #[test]
    fn pre_verification_gas_ignores_signature_content() {
        let gas_oh = Overhead::default();
        let uo = UserOperation::default()
            .sender(Address::random())
            .call_data(Bytes::from(vec![0xab; 64]))
            .call_gas_limit(21_900.into())
            .verification_gas_limit(100_000.into())
            .max_fee_per_gas(1_000_000_000.into());

        let with_real_sig =
            gas_oh.calculate_pre_verification_gas(&uo.clone().signature(Bytes::from(vec![0xff; 65])));
        let with_empty_sig = gas_oh.calculate_pre_verification_gas(&uo.signature(Bytes::default()));

        assert_eq!(with_real_sig, with_empty_sig);
    }

    #[test]
    fn pre_verification_gas_prices_zero_bytes_cheaper() {
        let gas_oh = Overhead::default();
        let uo = UserOperation::default().sender(Address::random());

        let zeros =
            gas_oh.calculate_pre_verification_gas(&uo.clone().call_data(Bytes::from(vec![0u8; 100])));
        let non_zeros =
            gas_oh.calculate_pre_verification_gas(&uo.call_data(Bytes::from(vec![1u8; 100])));

        // 100 bytes at 16 gas instead of 4 gas each
        assert_eq!(non_zeros - zeros, U256::from(100 * 12));
    }

    #[test]
    fn pre_verification_gas_calculation_overflow() {
        let gas_oh = Overhead {
            fixed: U256::max_value(),
            per_user_op: U256::max_value(),
            per_user_op_word: U256::max_value(),
            zero_byte: U256::max_value(),
            non_zero_byte: U256::max_value(),
            bundle_size: U256::from(1),
            sig_size: U256::from(65),
        };

        let uo = UserOperation::default()
            .sender(Address::default())
            .nonce(U256::max_value())
            .init_code(Bytes::from(vec![255; 1024]))
            .call_data(Bytes::from(vec![255; 1024]))
            .call_gas_limit(U256::max_value())
            .verification_gas_limit(U256::max_value())
            .pre_verification_gas(U256::max_value())
            .max_fee_per_gas(U256::max_value())
            .max_priority_fee_per_gas(U256::max_value())
            .paymaster_and_data(Bytes::from(vec![255; 1024]));

        // saturating arithmetic has to survive adversarial overhead values
        let _ = gas_oh.calculate_pre_verification_gas(&uo);
    }
}
