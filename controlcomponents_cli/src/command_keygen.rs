use controlcomponents::*;
use rand::rngs::OsRng;

pub fn command_keygen(matches: &clap::ArgMatches) {
    let config = Config::from_env().unwrap_or_else(|e| {
        eprintln!("controlcomponents keygen: {}", e);
        std::process::exit(1);
    });
    let phi = match matches.value_of("phi") {
        Some(phi) => phi.parse().unwrap_or_else(|e| {
            eprintln!("controlcomponents keygen: invalid phi {}: {}", phi, e);
            std::process::exit(1);
        }),
        None => config.phi,
    };

    let keys = gen_keys_ccr(&GqGroup::default(), phi, &mut OsRng).unwrap_or_else(|e| {
        eprintln!("controlcomponents keygen: {}", e);
        std::process::exit(1);
    });
    let (secret, public) = generate_keypair();

    println!("signing-secret-key: {}", hex::encode(secret.to_bytes()));
    println!("signing-public-key: {}", hex::encode(public.to_bytes()));
    match serde_json::to_string_pretty(&keys) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("controlcomponents keygen: {}", e);
            std::process::exit(1);
        }
    }
}
