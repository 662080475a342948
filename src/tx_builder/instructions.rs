//! Instruction planning and ordering validation
//!
//! Builds the ordered instruction list for a direct mint launch:
//! 1. Platform fee transfer
//! 2. Referrer fee transfer
//! 3. Create mint account (pointer-only space, full-space rent)
//! 4. Initialize metadata pointer (self-referential)
//! 5. Initialize mint
//! 6. Initialize token metadata
//! 7. Create the requester's associated token account
//! 8. Mint initial supply
//! 9. Revoke mint authority
//! 10. Revoke freeze authority
//!
//! Every instruction is tagged with its [`LaunchStep`] and the tag sequence is
//! checked before a plan is returned. [`classify_instruction`] decodes raw
//! instructions back into a [`InstructionKind`] so callers (and tests) can
//! inspect what actually goes on the wire.

use serde::Serialize;
use solana_sdk::{
    instruction::Instruction, pubkey::Pubkey, system_instruction::{self, SystemInstruction},
    system_program,
};
use spl_associated_token_account::{
    get_associated_token_address_with_program_id, instruction::create_associated_token_account,
};
use spl_token_2022::{
    extension::metadata_pointer,
    instruction::{self as token_instruction, AuthorityType, TokenInstruction},
};
use spl_token_metadata_interface::instruction::TokenMetadataInstruction;

use super::{errors::LaunchError, fees::FeeBreakdown, fees::MintConfig, space::MintSpace};

/// Role of one instruction within a launch bundle
///
/// Variants are declared in bundle order; the derived `Ord` is the rank used
/// by [`sanity_check_launch_order`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchStep {
    PlatformFee,
    ReferrerFee,
    CreateMintAccount,
    InitializeMetadataPointer,
    InitializeMint,
    InitializeMetadata,
    CreateHoldingAccount,
    MintSupply,
    RevokeMintAuthority,
    RevokeFreezeAuthority,
    /// Opaque instruction returned by the bonding curve service
    Pool,
}

impl LaunchStep {
    fn repeatable(self) -> bool {
        matches!(self, Self::Pool)
    }
}

/// Ordered instructions with their step tags
#[derive(Debug, Clone, Default)]
pub struct LaunchPlan {
    pub instructions: Vec<Instruction>,
    pub steps: Vec<LaunchStep>,
}

impl LaunchPlan {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            instructions: Vec::with_capacity(capacity),
            steps: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, step: LaunchStep, instruction: Instruction) {
        self.instructions.push(instruction);
        self.steps.push(step);
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Index of the first instruction tagged `step`
    pub fn position(&self, step: LaunchStep) -> Option<usize> {
        self.steps.iter().position(|s| *s == step)
    }

    pub fn contains(&self, step: LaunchStep) -> bool {
        self.position(step).is_some()
    }
}

/// Token parameters for the mint-creation steps (3–6)
#[derive(Debug, Clone)]
pub struct MintCreation {
    pub mint: Pubkey,
    pub authority: Pubkey,
    pub decimals: u8,
    pub name: String,
    pub symbol: String,
    pub uri: String,
    pub space: MintSpace,
}

/// Fee recipients for steps 1–2
#[derive(Debug, Clone, Copy)]
pub struct FeeTransfers {
    pub payer: Pubkey,
    pub fees: FeeBreakdown,
    pub platform_wallet: Option<Pubkey>,
    pub referrer: Option<Pubkey>,
}

/// Everything a direct launch needs
#[derive(Debug, Clone)]
pub struct DirectLaunchParams {
    pub fee_transfers: FeeTransfers,
    pub mint: MintCreation,
    /// Raw base units (`supply × 10^decimals`)
    pub raw_supply: u64,
    pub config: MintConfig,
}

/// Append fee transfers, skipping unset recipients and zero amounts
pub fn push_fee_transfers(plan: &mut LaunchPlan, transfers: &FeeTransfers) {
    if let Some(platform) = transfers.platform_wallet {
        if transfers.fees.platform_share > 0 {
            plan.push(
                LaunchStep::PlatformFee,
                system_instruction::transfer(&transfers.payer, &platform, transfers.fees.platform_share),
            );
        }
    }

    if let Some(referrer) = transfers.referrer {
        if transfers.fees.referrer_share > 0 {
            plan.push(
                LaunchStep::ReferrerFee,
                system_instruction::transfer(&transfers.payer, &referrer, transfers.fees.referrer_share),
            );
        }
    }
}

/// Append mint account creation through metadata initialization
///
/// The account is allocated at `initial_space` but funded for `full_space`
/// so metadata initialization can grow it in place.
pub fn push_mint_creation(
    plan: &mut LaunchPlan,
    payer: &Pubkey,
    creation: &MintCreation,
) -> Result<(), LaunchError> {
    let token_program = spl_token_2022::id();
    let mint = &creation.mint;
    let authority = &creation.authority;

    plan.push(
        LaunchStep::CreateMintAccount,
        system_instruction::create_account(
            payer,
            mint,
            creation.space.rent_lamports,
            creation.space.initial_space as u64,
            &token_program,
        ),
    );

    plan.push(
        LaunchStep::InitializeMetadataPointer,
        metadata_pointer::instruction::initialize(&token_program, mint, Some(*authority), Some(*mint))?,
    );

    plan.push(
        LaunchStep::InitializeMint,
        token_instruction::initialize_mint(&token_program, mint, authority, Some(authority), creation.decimals)?,
    );

    plan.push(
        LaunchStep::InitializeMetadata,
        spl_token_metadata_interface::instruction::initialize(
            &token_program,
            mint,
            authority,
            mint,
            authority,
            creation.name.clone(),
            creation.symbol.clone(),
            creation.uri.clone(),
        ),
    );

    Ok(())
}

/// Plan the single atomic bundle of a direct launch
///
/// The holding account and mint-to are only emitted when there is supply to
/// mint; with zero supply any revocations follow metadata initialization
/// directly.
///
/// # Errors
///
/// Returns `LaunchError::InvalidInstructionOrder` if the resulting sequence
/// breaks the ordering rules (a sequencer bug) and `LaunchError::Internal`
/// if an SPL instruction fails to encode.
pub fn plan_direct_launch(params: &DirectLaunchParams) -> Result<LaunchPlan, LaunchError> {
    let token_program = spl_token_2022::id();
    let payer = params.fee_transfers.payer;
    let mint = params.mint.mint;
    let authority = params.mint.authority;

    let mut plan = LaunchPlan::with_capacity(10);

    push_fee_transfers(&mut plan, &params.fee_transfers);
    push_mint_creation(&mut plan, &payer, &params.mint)?;

    if params.raw_supply > 0 {
        let holding = get_associated_token_address_with_program_id(&authority, &mint, &token_program);
        plan.push(
            LaunchStep::CreateHoldingAccount,
            create_associated_token_account(&payer, &authority, &mint, &token_program),
        );
        plan.push(
            LaunchStep::MintSupply,
            token_instruction::mint_to(&token_program, &mint, &holding, &authority, &[], params.raw_supply)?,
        );
    }

    if params.config.revoke_mint {
        plan.push(
            LaunchStep::RevokeMintAuthority,
            token_instruction::set_authority(
                &token_program,
                &mint,
                None,
                AuthorityType::MintTokens,
                &authority,
                &[],
            )?,
        );
    }

    if params.config.revoke_freeze {
        plan.push(
            LaunchStep::RevokeFreezeAuthority,
            token_instruction::set_authority(
                &token_program,
                &mint,
                None,
                AuthorityType::FreezeAccount,
                &authority,
                &[],
            )?,
        );
    }

    sanity_check_launch_order(&plan.steps, true)?;
    Ok(plan)
}

/// Validate the step sequence of a plan
///
/// Rules:
/// - the plan is non-empty
/// - steps appear in declaration order of [`LaunchStep`], each at most once
///   (opaque pool instructions may repeat)
/// - with `requires_mint`, steps 3–6 are all present
/// - revocations come after metadata initialization and after mint-to
///
/// Runs in every build: an out-of-order bundle could leave a mint without
/// metadata or supply that can never be fixed.
pub fn sanity_check_launch_order(steps: &[LaunchStep], requires_mint: bool) -> Result<(), LaunchError> {
    if steps.is_empty() {
        return Err(LaunchError::invalid_order("instruction list is empty"));
    }

    for pair in steps.windows(2) {
        let (prev, next) = (pair[0], pair[1]);
        let ordered = prev < next || (prev == next && next.repeatable());
        if !ordered {
            return Err(LaunchError::invalid_order(format!(
                "{next:?} must not follow {prev:?}"
            )));
        }
    }

    if requires_mint {
        for required in [
            LaunchStep::CreateMintAccount,
            LaunchStep::InitializeMetadataPointer,
            LaunchStep::InitializeMint,
            LaunchStep::InitializeMetadata,
        ] {
            if !steps.contains(&required) {
                return Err(LaunchError::invalid_order(format!("missing {required:?}")));
            }
        }
    }

    let revokes = steps
        .iter()
        .any(|s| matches!(s, LaunchStep::RevokeMintAuthority | LaunchStep::RevokeFreezeAuthority));
    if revokes && !steps.contains(&LaunchStep::InitializeMetadata) {
        return Err(LaunchError::invalid_order(
            "authority revocation without metadata initialization",
        ));
    }

    Ok(())
}

/// Which authority a set-authority instruction targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorityKind {
    Mint,
    Freeze,
    Other,
}

/// Decoded view of a raw instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstructionKind {
    Transfer { to: Pubkey, lamports: u64 },
    CreateAccount { lamports: u64, space: u64, owner: Pubkey },
    InitializeMetadataPointer,
    InitializeMint { decimals: u8 },
    InitializeMetadata { name: String, symbol: String, uri: String },
    CreateAssociatedTokenAccount,
    MintTo { amount: u64 },
    SetAuthority { authority: AuthorityKind, cleared: bool },
    Other { program_id: Pubkey },
}

/// Decode an instruction by program id and discriminator
///
/// Anything unrecognized falls back to [`InstructionKind::Other`].
pub fn classify_instruction(ix: &Instruction) -> InstructionKind {
    let other = InstructionKind::Other {
        program_id: ix.program_id,
    };

    if ix.program_id == system_program::id() {
        return match bincode::deserialize::<SystemInstruction>(&ix.data) {
            Ok(SystemInstruction::Transfer { lamports }) => InstructionKind::Transfer {
                to: ix.accounts.get(1).map(|a| a.pubkey).unwrap_or_default(),
                lamports,
            },
            Ok(SystemInstruction::CreateAccount {
                lamports,
                space,
                owner,
            }) => InstructionKind::CreateAccount {
                lamports,
                space,
                owner,
            },
            _ => other,
        };
    }

    if ix.program_id == spl_associated_token_account::id() {
        return InstructionKind::CreateAssociatedTokenAccount;
    }

    if ix.program_id != spl_token_2022::id() {
        return other;
    }

    // Metadata interface instructions carry an 8-byte discriminator that never
    // collides with single-byte token instruction tags
    if let Ok(TokenMetadataInstruction::Initialize(init)) = TokenMetadataInstruction::unpack(&ix.data) {
        return InstructionKind::InitializeMetadata {
            name: init.name,
            symbol: init.symbol,
            uri: init.uri,
        };
    }

    match TokenInstruction::unpack(&ix.data) {
        Ok(TokenInstruction::InitializeMint { decimals, .. })
        | Ok(TokenInstruction::InitializeMint2 { decimals, .. }) => {
            InstructionKind::InitializeMint { decimals }
        }
        Ok(TokenInstruction::MintTo { amount }) | Ok(TokenInstruction::MintToChecked { amount, .. }) => {
            InstructionKind::MintTo { amount }
        }
        Ok(TokenInstruction::SetAuthority {
            authority_type,
            new_authority,
        }) => InstructionKind::SetAuthority {
            authority: match authority_type {
                AuthorityType::MintTokens => AuthorityKind::Mint,
                AuthorityType::FreezeAccount => AuthorityKind::Freeze,
                _ => AuthorityKind::Other,
            },
            cleared: new_authority.is_none(),
        },
        // Sub-instruction 0 of the pointer extension is Initialize
        Ok(TokenInstruction::MetadataPointerExtension) if ix.data.get(1) == Some(&0) => {
            InstructionKind::InitializeMetadataPointer
        }
        _ => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tx_builder::fees::{compute_fee_breakdown, FeeSchedule};
    use crate::tx_builder::space::base_mint_space;

    fn params(config: MintConfig, raw_supply: u64, referrer: Option<Pubkey>) -> DirectLaunchParams {
        let payer = Pubkey::new_unique();
        let initial_space = base_mint_space().unwrap();
        DirectLaunchParams {
            fee_transfers: FeeTransfers {
                payer,
                fees: compute_fee_breakdown(&FeeSchedule::default(), &config, referrer.is_some()),
                platform_wallet: Some(Pubkey::new_unique()),
                referrer,
            },
            mint: MintCreation {
                mint: Pubkey::new_unique(),
                authority: payer,
                decimals: 6,
                name: "Launch Token".into(),
                symbol: "LNCH".into(),
                uri: "ipfs://bafymeta".into(),
                space: MintSpace {
                    initial_space,
                    full_space: initial_space + 120,
                    metadata_len: 116,
                    rent_lamports: 3_000_000,
                },
            },
            raw_supply,
            config,
        }
    }

    #[test]
    fn test_full_direct_plan_order() {
        let config = MintConfig {
            revoke_mint: true,
            revoke_freeze: true,
        };
        let plan = plan_direct_launch(&params(config, 1_000_000, Some(Pubkey::new_unique()))).unwrap();

        assert_eq!(
            plan.steps,
            vec![
                LaunchStep::PlatformFee,
                LaunchStep::ReferrerFee,
                LaunchStep::CreateMintAccount,
                LaunchStep::InitializeMetadataPointer,
                LaunchStep::InitializeMint,
                LaunchStep::InitializeMetadata,
                LaunchStep::CreateHoldingAccount,
                LaunchStep::MintSupply,
                LaunchStep::RevokeMintAuthority,
                LaunchStep::RevokeFreezeAuthority,
            ]
        );
        assert_eq!(plan.instructions.len(), 10);
    }

    #[test]
    fn test_classifier_matches_tags() {
        let config = MintConfig {
            revoke_mint: true,
            revoke_freeze: true,
        };
        let p = params(config, 42, Some(Pubkey::new_unique()));
        let plan = plan_direct_launch(&p).unwrap();

        let kinds: Vec<_> = plan.instructions.iter().map(classify_instruction).collect();
        assert!(matches!(kinds[0], InstructionKind::Transfer { lamports, .. } if lamports == p.fee_transfers.fees.platform_share));
        assert!(matches!(kinds[1], InstructionKind::Transfer { lamports, .. } if lamports == p.fee_transfers.fees.referrer_share));
        assert_eq!(
            kinds[2],
            InstructionKind::CreateAccount {
                lamports: p.mint.space.rent_lamports,
                space: p.mint.space.initial_space as u64,
                owner: spl_token_2022::id(),
            }
        );
        assert_eq!(kinds[3], InstructionKind::InitializeMetadataPointer);
        assert_eq!(kinds[4], InstructionKind::InitializeMint { decimals: 6 });
        assert_eq!(
            kinds[5],
            InstructionKind::InitializeMetadata {
                name: "Launch Token".into(),
                symbol: "LNCH".into(),
                uri: "ipfs://bafymeta".into(),
            }
        );
        assert_eq!(kinds[6], InstructionKind::CreateAssociatedTokenAccount);
        assert_eq!(kinds[7], InstructionKind::MintTo { amount: 42 });
        assert_eq!(
            kinds[8],
            InstructionKind::SetAuthority {
                authority: AuthorityKind::Mint,
                cleared: true
            }
        );
        assert_eq!(
            kinds[9],
            InstructionKind::SetAuthority {
                authority: AuthorityKind::Freeze,
                cleared: true
            }
        );
    }

    #[test]
    fn test_zero_supply_skips_mint_to() {
        let config = MintConfig {
            revoke_mint: true,
            revoke_freeze: false,
        };
        let plan = plan_direct_launch(&params(config, 0, None)).unwrap();

        assert!(!plan.contains(LaunchStep::MintSupply));
        let metadata = plan.position(LaunchStep::InitializeMetadata).unwrap();
        assert_eq!(plan.position(LaunchStep::RevokeMintAuthority), Some(metadata + 1));
    }

    #[test]
    fn test_fee_transfer_skips() {
        let mut p = params(MintConfig::default(), 1, None);
        p.fee_transfers.platform_wallet = None;
        let plan = plan_direct_launch(&p).unwrap();
        assert_eq!(plan.steps[0], LaunchStep::CreateMintAccount);

        // Referrer present but its share rounds to zero
        let mut p = params(MintConfig::default(), 1, Some(Pubkey::new_unique()));
        p.fee_transfers.fees.referrer_share = 0;
        let plan = plan_direct_launch(&p).unwrap();
        assert!(!plan.contains(LaunchStep::ReferrerFee));
        assert!(plan.contains(LaunchStep::PlatformFee));
    }

    #[test]
    fn test_revocations_follow_mint_to_for_all_flag_combinations() {
        for (revoke_mint, revoke_freeze) in [(false, false), (true, false), (false, true), (true, true)] {
            let config = MintConfig {
                revoke_mint,
                revoke_freeze,
            };
            let plan = plan_direct_launch(&params(config, 500, None)).unwrap();
            let mint_to = plan.position(LaunchStep::MintSupply).unwrap();
            for (index, step) in plan.steps.iter().enumerate() {
                if matches!(step, LaunchStep::RevokeMintAuthority | LaunchStep::RevokeFreezeAuthority) {
                    assert!(index > mint_to);
                }
            }
            assert_eq!(plan.contains(LaunchStep::RevokeMintAuthority), revoke_mint);
            assert_eq!(plan.contains(LaunchStep::RevokeFreezeAuthority), revoke_freeze);
        }
    }

    #[test]
    fn test_order_check_rejects_revoke_before_mint_to() {
        let steps = [
            LaunchStep::CreateMintAccount,
            LaunchStep::InitializeMetadataPointer,
            LaunchStep::InitializeMint,
            LaunchStep::InitializeMetadata,
            LaunchStep::RevokeMintAuthority,
            LaunchStep::MintSupply,
        ];
        let err = sanity_check_launch_order(&steps, true).unwrap_err();
        assert!(matches!(err, LaunchError::InvalidInstructionOrder(_)));
    }

    #[test]
    fn test_order_check_requires_mint_steps() {
        let steps = [LaunchStep::PlatformFee, LaunchStep::CreateMintAccount];
        assert!(sanity_check_launch_order(&steps, true).is_err());
        assert!(sanity_check_launch_order(&[], false).is_err());
    }

    #[test]
    fn test_order_check_allows_repeated_pool_steps() {
        let steps = [LaunchStep::PlatformFee, LaunchStep::Pool, LaunchStep::Pool];
        assert!(sanity_check_launch_order(&steps, false).is_ok());

        let steps = [LaunchStep::PlatformFee, LaunchStep::PlatformFee];
        assert!(sanity_check_launch_order(&steps, false).is_err());
    }

    #[test]
    fn test_classify_unknown_program() {
        let ix = Instruction::new_with_bytes(Pubkey::new_unique(), &[1, 2, 3], vec![]);
        assert!(matches!(classify_instruction(&ix), InstructionKind::Other { .. }));
    }
}
